//! Listener contracts and the fault-contained fan-out hub.
//!
//! Two kinds of listener:
//!
//! - one [`ClientListener`], bound when the client is built, that carries the
//!   bot's business logic (chat messages, fallback commands, lifecycle);
//! - any number of [`StateListener`] observers that follow connection and
//!   registration state.
//!
//! Every call into listener code goes through the hub, which logs an `Err`
//! or a panic and carries on. A faulty plugin never stops the read loop.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tracing::error;

use super::ChatClient;
use super::registry::Command;
use crate::error::HubError;

/// Business-logic listener bound to a [`ChatClient`] at construction.
///
/// All methods have no-op defaults.
#[async_trait]
pub trait ClientListener: Send + Sync {
    /// Called once per [`ChatClient::connect`], before the first attempt.
    async fn on_load(&self, _client: &ChatClient) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once the channel is joined, before the writer starts.
    async fn on_start(&self, _client: &ChatClient) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a session begins draining.
    async fn on_stop(&self, _client: &ChatClient) -> anyhow::Result<()> {
        Ok(())
    }

    /// A chat line that is not a command.
    async fn on_message(
        &self,
        _client: &ChatClient,
        _sender: &str,
        _text: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// A command with no registered executor.
    ///
    /// `args[0]` is the label without the command prefix. Returns whether
    /// the command was handled.
    async fn on_command(
        &self,
        _client: &ChatClient,
        _sender: &str,
        _label: &str,
        _args: &[String],
    ) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Observer of connection and registration state.
///
/// Called synchronously from the read loop or from the registering caller;
/// implementations should not block.
pub trait StateListener: Send + Sync {
    fn on_connected(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_disconnected(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Echo of chat traffic: inbound messages and the bot's own
    /// [`ChatClient::send_message`] calls.
    fn on_message(&self, _sender: &str, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_command_registered(&self, _label: &str, _command: &Command) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_command_unregistered(&self, _label: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Primary listener plus observers.
pub struct ListenerHub {
    primary: Arc<dyn ClientListener>,
    observers: RwLock<Vec<Arc<dyn StateListener>>>,
}

impl ListenerHub {
    pub fn new(primary: Arc<dyn ClientListener>) -> Self {
        Self {
            primary,
            observers: RwLock::new(Vec::new()),
        }
    }

    // ========================================================================
    // Observer registration
    // ========================================================================

    pub fn add_observer(&self, observer: Arc<dyn StateListener>) -> Result<(), HubError> {
        let mut observers = self.observers.write();
        if observers.iter().any(|o| same_listener(o, &observer)) {
            return Err(HubError::AlreadyRegistered);
        }
        observers.push(observer);
        Ok(())
    }

    pub fn remove_observer(&self, observer: &Arc<dyn StateListener>) -> Result<(), HubError> {
        let mut observers = self.observers.write();
        let index = observers
            .iter()
            .position(|o| same_listener(o, observer))
            .ok_or(HubError::NotRegistered)?;
        observers.remove(index);
        Ok(())
    }

    pub fn clear_observers(&self) {
        self.observers.write().clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    // ========================================================================
    // Primary listener dispatch
    // ========================================================================

    pub async fn on_load(&self, client: &ChatClient) {
        contain_async("on_load", self.primary.on_load(client)).await;
    }

    pub async fn on_start(&self, client: &ChatClient) {
        contain_async("on_start", self.primary.on_start(client)).await;
    }

    pub async fn on_stop(&self, client: &ChatClient) {
        contain_async("on_stop", self.primary.on_stop(client)).await;
    }

    pub async fn on_message(&self, client: &ChatClient, sender: &str, text: &str) {
        contain_async("on_message", self.primary.on_message(client, sender, text)).await;
    }

    /// Fallback command dispatch. A faulty listener counts as handled.
    pub async fn on_command(
        &self,
        client: &ChatClient,
        sender: &str,
        label: &str,
        args: &[String],
    ) -> bool {
        contain_async(
            "on_command",
            self.primary.on_command(client, sender, label, args),
        )
        .await
        .unwrap_or(true)
    }

    // ========================================================================
    // Observer fan-out
    // ========================================================================

    pub fn connected(&self) {
        self.notify("on_connected", |o| o.on_connected());
    }

    pub fn disconnected(&self) {
        self.notify("on_disconnected", |o| o.on_disconnected());
    }

    pub fn message(&self, sender: &str, text: &str) {
        self.notify("on_message", |o| o.on_message(sender, text));
    }

    pub fn command_registered(&self, label: &str, command: &Command) {
        self.notify("on_command_registered", |o| {
            o.on_command_registered(label, command)
        });
    }

    pub fn command_unregistered(&self, label: &str) {
        self.notify("on_command_unregistered", |o| o.on_command_unregistered(label));
    }

    /// Call `f` on a snapshot of the observers, in registration order.
    fn notify<F>(&self, hook: &'static str, f: F)
    where
        F: Fn(&dyn StateListener) -> anyhow::Result<()>,
    {
        let observers = self.observers.read().clone();
        for observer in &observers {
            contain(hook, || f(observer.as_ref()));
        }
    }
}

fn same_listener(a: &Arc<dyn StateListener>, b: &Arc<dyn StateListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Run a synchronous listener call, logging an error or panic.
pub(crate) fn contain<T>(hook: &'static str, f: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(hook, error = %e, "Callback returned an error");
            None
        }
        Err(panic) => {
            error!(hook, panic = %panic_message(panic.as_ref()), "Callback panicked");
            None
        }
    }
}

/// Await a listener future, logging an error or panic.
pub(crate) async fn contain_async<T>(
    hook: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Option<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(hook, error = %e, "Callback returned an error");
            None
        }
        Err(panic) => {
            error!(hook, panic = %panic_message(panic.as_ref()), "Callback panicked");
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
