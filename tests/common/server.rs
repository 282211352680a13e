//! Fake chat server.
//!
//! Binds a TCP listener on a random local port and plays the server side
//! of the protocol line by line, so tests can script exactly what the
//! client sees and assert on exactly what it writes.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Default wait for anything the client is expected to do.
pub const STEP: Duration = Duration::from_secs(5);

/// Listening side of the fake server.
pub struct TestServer {
    listener: TcpListener,
    port: u16,
}

impl TestServer {
    /// Bind on `127.0.0.1` with an OS-assigned port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept the next client connection.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = timeout(STEP, self.listener.accept()).await??;
        Ok(ServerConn::new(stream))
    }

    /// Assert that no client connects within `within`.
    #[allow(dead_code)]
    pub async fn expect_no_connection(&self, within: Duration) {
        if let Ok(Ok((_, addr))) = timeout(within, self.listener.accept()).await {
            panic!("unexpected connection from {addr}");
        }
    }
}

/// One accepted client connection, seen from the server.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl ServerConn {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    /// Send one line; CR-LF is appended.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a channel message from `sender` to `#channel`.
    #[allow(dead_code)]
    pub async fn chat(&mut self, sender: &str, channel: &str, text: &str) -> anyhow::Result<()> {
        self.send(&format!(
            ":{sender}!{sender}@{sender}.tmi.twitch.tv PRIVMSG #{channel} :{text}"
        ))
        .await
    }

    /// Read the next line, terminator stripped.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(STEP).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("client closed the connection");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read the next line and assert it equals `expected`.
    pub async fn expect(&mut self, expected: &str) {
        let line = self
            .recv()
            .await
            .unwrap_or_else(|e| panic!("waiting for {expected:?}: {e}"));
        assert_eq!(line, expected);
    }

    /// Assert that the client writes nothing within `within`.
    #[allow(dead_code)]
    pub async fn expect_silence(&mut self, within: Duration) {
        if let Ok(line) = self.recv_timeout(within).await {
            panic!("unexpected line {line:?}");
        }
    }

    /// Assert that the client closes its side of the connection.
    #[allow(dead_code)]
    pub async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = timeout(STEP, self.reader.read_line(&mut line))
            .await
            .expect("client did not close the connection")
            .unwrap_or(0);
        assert_eq!(n, 0, "expected EOF, got {line:?}");
    }

    /// Play the login and join exchange for `nick`, with the default
    /// announcement.
    pub async fn login(&mut self, nick: &str) -> anyhow::Result<()> {
        self.expect("PASS oauth:test").await;
        self.expect(&format!("NICK {nick}")).await;

        self.send(":tmi.twitch.tv 001 bot :Welcome, GLHF!").await?;
        self.send(":tmi.twitch.tv 372 bot :You are in a maze of twisty passages.")
            .await?;
        self.send(":tmi.twitch.tv 376 bot :>").await?;

        self.expect("CAP REQ :twitch.tv/commands").await;
        self.expect(&format!("JOIN #{nick}")).await;
        self.expect(&format!("PRIVMSG #{nick} :Bot running...")).await;

        self.send(":tmi.twitch.tv CAP * ACK :twitch.tv/commands").await?;
        self.send(&format!(":{nick}!{nick}@{nick}.tmi.twitch.tv JOIN #{nick}"))
            .await?;
        self.send(&format!(":{nick}.tmi.twitch.tv 353 {nick} = #{nick} :{nick}"))
            .await?;
        self.send(&format!(
            ":{nick}.tmi.twitch.tv 366 {nick} #{nick} :End of /NAMES list"
        ))
        .await?;
        Ok(())
    }

    /// Drop the connection.
    #[allow(dead_code)]
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
