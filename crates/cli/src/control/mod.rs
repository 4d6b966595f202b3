//! Control API
//!
//! Small JSON surface over the reload/restart paths and the validated write
//! path:
//!
//! | Method | Path | |
//! |--------|------|---|
//! | GET | `/status` | listener state, config version, counters |
//! | POST | `/restart` | reload credentials and force a listener restart |
//! | POST | `/reload` | reload the config file |
//! | GET/POST | `/routes` | list / add routes |
//! | PUT/DELETE | `/routes/{chat_id}` | replace / delete a route |
//! | DELETE | `/routes/{chat_id}/url?url=` | remove one target |
//! | GET/POST | `/settings` | read / replace credentials |
//! | GET | `/execution_counts` | successful deliveries per route target |

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use config_loader::ConfigSource;
use dispatcher::{DispatchHandle, HttpDeliveryClient};
use listener::SupervisorHandle;
use observability::NotificationHub;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct ControlState {
    pub source: Arc<ConfigSource>,
    pub supervisor: SupervisorHandle,
    pub dispatch: DispatchHandle<HttpDeliveryClient>,
    pub hub: NotificationHub,
    pub started: Instant,
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/restart", post(handlers::restart))
        .route("/reload", post(handlers::reload))
        .route(
            "/routes",
            get(handlers::list_routes).post(handlers::create_route),
        )
        .route(
            "/routes/{chat_id}",
            put(handlers::update_route).delete(handlers::delete_route),
        )
        .route("/routes/{chat_id}/url", delete(handlers::remove_target))
        .route(
            "/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        .route("/execution_counts", get(handlers::execution_counts))
        .with_state(state)
}

/// Bind and serve until `cancel` fires.
///
/// Bind failure is returned to the caller; the router cannot be managed
/// without its control surface.
pub async fn serve(
    addr: SocketAddr,
    state: ControlState,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control API on {addr}"))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Control API listening");

    let app = router(state);
    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "Control API server error");
        }
    });
    Ok((local_addr, task))
}
