//! Shared application context handed to every component at construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::notify::{Mailer, SmtpMailer};
use crate::queue::IntakeQueue;
use crate::runner::{PhantomRunner, TestRunner};
use crate::store::{RequestStore, UsergridStore};
use crate::system::StatsProvider;

/// Everything the pipeline, HTTP surface and lifecycle share.
///
/// Cloning is cheap; all clones see the same queue, tracker and token.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub queue: Arc<IntakeQueue>,
    pub stats: Arc<StatsProvider>,
    pub runner: Arc<dyn TestRunner>,
    pub mailer: Arc<dyn Mailer>,
    pub store: Arc<dyn RequestStore>,
    /// Owns every spawned pipeline task.
    pub tracker: TaskTracker,
    pub cancel: CancellationToken,
}

impl AppContext {
    /// Assemble a context around the given collaborators.
    pub fn new(
        config: Config,
        runner: Arc<dyn TestRunner>,
        mailer: Arc<dyn Mailer>,
        store: Arc<dyn RequestStore>,
    ) -> Self {
        let queue = Arc::new(IntakeQueue::new());
        let tracker = TaskTracker::new();
        let stats = Arc::new(StatsProvider::new(Arc::clone(&queue), tracker.clone()));
        Self {
            config: Arc::new(config),
            queue,
            stats,
            runner,
            mailer,
            store,
            tracker,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the production collaborators: PhantomJS, SMTP and a logged-in Usergrid client.
    pub async fn connect(config: Config) -> Result<Self> {
        let runner = PhantomRunner::from_config(&config.tool);
        let mailer = SmtpMailer::new(&config.email).context("Invalid SMTP configuration")?;
        let store = UsergridStore::login(&config.store)
            .await
            .context("Usergrid login failed")?;

        Ok(Self::new(
            config,
            Arc::new(runner),
            Arc::new(mailer),
            Arc::new(store),
        ))
    }
}
