//! Integration test common infrastructure.
//!
//! Provides a scripted fake chat server, a recording listener, and helpers
//! for running a [`nuclearbot::ChatClient`] against them.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::{
    Event, Events, Fault, NICK, Recorder, build_client, join_client, spawn_client, test_config,
};
#[allow(unused_imports)]
pub use server::{STEP, ServerConn, TestServer};
