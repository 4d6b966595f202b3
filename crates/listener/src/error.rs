//! Supervisor error types

use thiserror::Error;

/// Errors returned by `SupervisorHandle`
///
/// Listener failures are not errors here: they leave the supervisor in
/// `Stopped` and are reported through the NotificationSink.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor task has exited
    #[error("listener supervisor is not running")]
    Closed,
}
