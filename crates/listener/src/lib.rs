//! # Listener
//!
//! Inbound listener lifecycle.
//!
//! - `ListenerSupervisor`: Stopped / Starting / Running / Restarting state machine,
//!   run as an actor behind a cloneable `SupervisorHandle`
//! - `HttpPushListener`: platform push notifications over HTTP (axum)
//! - `MockListener`: in-process listener fed by tests

pub mod error;
pub mod http;
pub mod mock;
pub mod supervisor;

pub use error::SupervisorError;
pub use http::{HttpListenerConfig, HttpPushListener, HttpPushListenerFactory};
pub use mock::{MockListener, MockListenerFactory};
pub use supervisor::{ListenerSupervisor, SupervisorConfig, SupervisorHandle};
