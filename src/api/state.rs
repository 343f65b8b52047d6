use std::sync::Arc;

use crate::context::AppContext;
use crate::queue::IntakeQueue;
use crate::system::StatsProvider;

/// What the HTTP handlers may touch: the queue to admit into and the stats to report.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<IntakeQueue>,
    pub stats: Arc<StatsProvider>,
}

impl From<&AppContext> for AppState {
    fn from(ctx: &AppContext) -> Self {
        Self {
            queue: Arc::clone(&ctx.queue),
            stats: Arc::clone(&ctx.stats),
        }
    }
}
