//! WebSocket client for the relay.
//!
//! Registers the local identity on every (re)connect, turns relay frames
//! into `SignalingEvent`s, and sends outbound messages through
//! `SignalSink`. Reconnects with exponential backoff.

mod client;
mod connection;
mod types;

pub use client::{SignalSink, SignalingClient};
pub use types::{SignalingConfig, SignalingEvent};
