//! speedreport -- queued web performance testing over HTTP.
//!
//! Callers submit a URL (and optionally an email address) to `/test`. The
//! request is queued, persisted to Usergrid, measured by an external test
//! tool, and the requester is emailed links to the results.

pub mod api;
pub mod config;
pub mod context;
pub mod lifecycle;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod runner;
pub mod store;
pub mod system;

use std::future::IntoFuture;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::context::AppContext;
use crate::lifecycle::{shutdown_signal, Lifecycle};
use crate::pipeline::Pipeline;

/// Start the daemon: connect collaborators, start the pipeline, serve HTTP
/// until a termination signal or a server error.
pub async fn serve(config: Config) -> Result<()> {
    let bind = config.server.bind_addr();
    let ctx = AppContext::connect(config).await?;
    let pipeline = Pipeline::spawn(&ctx);
    let lifecycle = Lifecycle::new(ctx.clone());
    let app = api::router(api::state::AppState::from(&ctx));

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%bind, error = %e, "Could not bind listener");
            lifecycle.teardown(&format!("failed to bind {bind}: {e}")).await;
            return Err(e).with_context(|| format!("failed to bind {bind}"));
        }
    };

    tracing::info!(%bind, "speedreport listening");
    ctx.stats.log_summary("Server is ready.");

    let outcome = tokio::select! {
        served = axum::serve(listener, app).into_future() => match served {
            Ok(()) => Ok("server stopped".to_string()),
            Err(e) => Err(e),
        },
        signal = shutdown_signal() => Ok(format!("received {signal}")),
    };

    match outcome {
        Ok(reason) => {
            lifecycle.teardown(&reason).await;
            pipeline.join().await;
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            lifecycle.teardown(&format!("server error: {e}")).await;
            pipeline.join().await;
            Err(e).context("HTTP server failed")
        }
    }
}
