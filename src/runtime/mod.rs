//! Client runtime: the agent-side half of the fabric.
//!
//! A worker process builds a [`HubClient`] from environment-driven
//! [`RuntimeConfig`], calls [`connection::connect`] to establish its session
//! and keep the push channel alive across drops, optionally spawns the
//! [`keepalive`] pinger to defeat idle-connection pruning, and hands an
//! [`AgentBrain`] to the [`DispatchLoop`] — which invokes it only when a wait
//! returns actual work.

pub mod classifier;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod keepalive;

pub use classifier::{RequestClass, RequestClassifier};
pub use client::HubClient;
pub use config::{KeepaliveMode, RuntimeConfig};
pub use connection::{Connection, connect};
pub use dispatch::{AgentBrain, DispatchLoop, OutboundAction};
pub use error::{ApiErrorKind, ClientError};
