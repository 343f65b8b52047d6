//! End-to-end pipeline tests with mocked tool, mailer and store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use speedreport::config::Config;
use speedreport::context::AppContext;
use speedreport::notify::mocks::MockMailer;
use speedreport::notify::{EmailError, Mailer, OutgoingEmail};
use speedreport::pipeline::Pipeline;
use speedreport::queue::{Admission, TestRequest};
use speedreport::runner::mocks::MockTestRunner;
use speedreport::runner::{ExecutionError, RunOutcome, TestRunner};
use speedreport::store::mocks::MockStore;

fn context_with(
    config: Config,
    runner: Arc<dyn TestRunner>,
    mailer: Arc<MockMailer>,
    store: Arc<MockStore>,
) -> AppContext {
    AppContext::new(config, runner, mailer, store)
}

/// Poll `check` until it holds or a second passes.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_request_is_tested_once_and_emailed_once() {
    let runner = Arc::new(MockTestRunner::new_success());
    let mailer = Arc::new(MockMailer::new());
    let store = Arc::new(MockStore::new());
    let ctx = context_with(
        Config::default(),
        runner.clone(),
        mailer.clone(),
        store.clone(),
    );
    let pipeline = Pipeline::spawn(&ctx);

    ctx.queue
        .enqueue(TestRequest::parse("example.com", Some("a@b.com")).unwrap());

    assert!(eventually(|| mailer.sent().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(runner.invocations(), vec!["http://example.com".to_string()]);
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@b.com");
    assert!(sent[0].body.contains("http://example.com"));
    assert!(eventually(|| store.saved().len() == 1).await);
    assert!(ctx.queue.is_empty());

    ctx.cancel.cancel();
    pipeline.join().await;
}

#[tokio::test]
async fn test_tool_failure_still_notifies() {
    let runner = Arc::new(MockTestRunner::new_failing());
    let mailer = Arc::new(MockMailer::new());
    let ctx = context_with(
        Config::default(),
        runner.clone(),
        mailer.clone(),
        Arc::new(MockStore::new()),
    );
    let pipeline = Pipeline::spawn(&ctx);

    ctx.queue
        .enqueue(TestRequest::parse("example.com", Some("a@b.com")).unwrap());

    assert!(eventually(|| mailer.sent().len() == 1).await);
    assert_eq!(runner.invocations().len(), 1);

    ctx.cancel.cancel();
    pipeline.join().await;
}

#[tokio::test]
async fn test_store_failure_does_not_block_the_request() {
    let runner = Arc::new(MockTestRunner::new_success());
    let mailer = Arc::new(MockMailer::new());
    let ctx = context_with(
        Config::default(),
        runner.clone(),
        mailer.clone(),
        Arc::new(MockStore::new_failing()),
    );
    let pipeline = Pipeline::spawn(&ctx);

    ctx.queue
        .enqueue(TestRequest::parse("example.com", Some("a@b.com")).unwrap());

    assert!(eventually(|| mailer.sent().len() == 1).await);
    assert_eq!(runner.invocations(), vec!["http://example.com".to_string()]);

    ctx.cancel.cancel();
    pipeline.join().await;
}

#[tokio::test]
async fn test_request_without_email_is_tested_but_not_mailed() {
    let runner = Arc::new(MockTestRunner::new_success());
    let mailer = Arc::new(MockMailer::new());
    let ctx = context_with(
        Config::default(),
        runner.clone(),
        mailer.clone(),
        Arc::new(MockStore::new()),
    );
    let pipeline = Pipeline::spawn(&ctx);

    ctx.queue.enqueue(TestRequest::parse("example.com", None).unwrap());

    assert!(eventually(|| runner.invocations().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mailer.sent().is_empty());

    ctx.cancel.cancel();
    pipeline.join().await;
}

#[tokio::test]
async fn test_cancellation_stops_idle_loops() {
    let ctx = context_with(
        Config::default(),
        Arc::new(MockTestRunner::new_success()),
        Arc::new(MockMailer::new()),
        Arc::new(MockStore::new()),
    );
    let pipeline = Pipeline::spawn(&ctx);

    ctx.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), pipeline.join())
        .await
        .expect("pipeline loops should stop after cancellation");
}

/// Holds every invocation until the test releases it.
struct GatedRunner {
    gate: Arc<Semaphore>,
    running: AtomicUsize,
}

#[async_trait]
impl TestRunner for GatedRunner {
    async fn invoke(&self, _target: &str) -> Result<RunOutcome, ExecutionError> {
        self.running.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.unwrap();
        Ok(RunOutcome {
            exit_code: Some(0),
            elapsed_ms: 0,
            stdout_bytes: 0,
        })
    }
}

#[tokio::test]
async fn test_saturated_dispatcher_leaves_requests_queued() {
    let gate = Arc::new(Semaphore::new(0));
    let runner = Arc::new(GatedRunner {
        gate: gate.clone(),
        running: AtomicUsize::new(0),
    });
    let mut config = Config::default();
    config.pipeline.max_concurrent_tests = 1;

    let mailer = Arc::new(MockMailer::new());
    let ctx = context_with(config, runner.clone(), mailer.clone(), Arc::new(MockStore::new()));
    let pipeline = Pipeline::spawn(&ctx);

    for n in 0..5 {
        let url = format!("site{n}.example");
        ctx.queue
            .enqueue(TestRequest::parse(&url, Some("a@b.com")).unwrap());
    }

    assert!(eventually(|| runner.running.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // One running, one held by the reader waiting to be accepted, the rest queued.
    assert_eq!(runner.running.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.queue.size(), 3);
    assert_eq!(
        ctx.queue
            .enqueue(TestRequest::parse("site4.example", None).unwrap()),
        Admission::AlreadyQueued
    );

    gate.add_permits(5);
    assert!(eventually(|| mailer.sent().len() == 5).await);
    assert!(ctx.queue.is_empty());

    ctx.cancel.cancel();
    pipeline.join().await;
}

/// Holds every send until the test releases it.
struct GatedMailer {
    gate: Arc<Semaphore>,
    sending: AtomicUsize,
    delivered: AtomicUsize,
}

#[async_trait]
impl Mailer for GatedMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), EmailError> {
        self.sending.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.unwrap();
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_saturated_notifier_backs_up_to_the_queue() {
    let gate = Arc::new(Semaphore::new(0));
    let mailer = Arc::new(GatedMailer {
        gate: gate.clone(),
        sending: AtomicUsize::new(0),
        delivered: AtomicUsize::new(0),
    });
    let runner = Arc::new(MockTestRunner::new_success());
    let mut config = Config::default();
    config.pipeline.max_concurrent_tests = 1;
    config.pipeline.max_concurrent_emails = 1;

    let ctx = AppContext::new(
        config,
        runner.clone(),
        mailer.clone(),
        Arc::new(MockStore::new()),
    );
    let pipeline = Pipeline::spawn(&ctx);

    for n in 0..6 {
        let url = format!("site{n}.example");
        ctx.queue
            .enqueue(TestRequest::parse(&url, Some("a@b.com")).unwrap());
    }

    assert!(eventually(|| mailer.sending.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // site0 is being mailed, site1 is tested and waits for the notifier,
    // site2 waits for the dispatcher, the rest are still queued.
    assert_eq!(runner.invocations().len(), 2);
    assert_eq!(ctx.queue.size(), 3);

    gate.add_permits(6);
    assert!(eventually(|| mailer.delivered.load(Ordering::SeqCst) == 6).await);
    assert!(ctx.queue.is_empty());

    ctx.cancel.cancel();
    pipeline.join().await;
}
