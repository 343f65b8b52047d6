//! Point-in-time process health: tasks, memory, uptime, queue depth.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::queue::IntakeQueue;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Snapshot served by `GET /status`.
///
/// Uptime fields are totals in their unit, not clock components:
/// 90 seconds is `uptime_minutes = 1.5`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStats {
    #[serde(rename = "goroutines")]
    pub active_tasks: usize,
    /// Resident memory of this process, MiB.
    pub total_memory: f64,
    pub uptime: f64,
    pub uptime_hours: f64,
    pub uptime_minutes: f64,
    pub uptime_seconds: f64,
    pub queue_depth: usize,
}

impl ProcessStats {
    /// Human-readable block for logs and the operator email.
    pub fn summary(&self) -> String {
        format!(
            "Active tasks:   {}\nTotal memory:   {:.2} MiB\nUptime:         {:.1}s ({:.2}h)\nQueue depth:    {}",
            self.active_tasks, self.total_memory, self.uptime_seconds, self.uptime_hours, self.queue_depth
        )
    }
}

/// Reads live counters on demand; holds no history.
pub struct StatsProvider {
    queue: Arc<IntakeQueue>,
    tracker: TaskTracker,
    started: Instant,
    started_at: DateTime<Utc>,
    system: Mutex<System>,
}

impl StatsProvider {
    /// Starts the uptime clock.
    pub fn new(queue: Arc<IntakeQueue>, tracker: TaskTracker) -> Self {
        Self {
            queue,
            tracker,
            started: Instant::now(),
            started_at: Utc::now(),
            system: Mutex::new(System::new()),
        }
    }

    pub fn snapshot(&self) -> ProcessStats {
        let uptime = self.started.elapsed().as_secs_f64();
        ProcessStats {
            active_tasks: self.tracker.len(),
            total_memory: self.resident_memory_mib(),
            uptime,
            uptime_hours: uptime / 3600.0,
            uptime_minutes: uptime / 60.0,
            uptime_seconds: uptime,
            queue_depth: self.queue.size(),
        }
    }

    fn resident_memory_mib(&self) -> f64 {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0.0;
        };
        let mut system = self.system.lock().unwrap_or_else(|p| p.into_inner());
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| process.memory() as f64 / BYTES_PER_MIB)
            .unwrap_or(0.0)
    }

    /// Emit the current snapshot as one structured event.
    pub fn log_summary(&self, message: &str) -> ProcessStats {
        let stats = self.snapshot();
        info!(
            goroutines = stats.active_tasks,
            total_memory_mib = format_args!("{:.2}", stats.total_memory),
            uptime_secs = format_args!("{:.1}", stats.uptime_seconds),
            queue_depth = stats.queue_depth,
            started_at = %self.started_at.to_rfc3339(),
            "{message}"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TestRequest;
    use std::time::Duration;

    #[test]
    fn test_snapshot_reports_queue_depth() {
        let queue = Arc::new(IntakeQueue::new());
        queue.enqueue(TestRequest::parse("a.com", None).unwrap());
        queue.enqueue(TestRequest::parse("b.com", None).unwrap());

        let stats = StatsProvider::new(queue, TaskTracker::new()).snapshot();
        assert_eq!(stats.queue_depth, 2);
        assert_eq!(stats.active_tasks, 0);
        assert!(stats.total_memory >= 0.0);
    }

    #[test]
    fn test_uptime_is_monotonic_and_consistent() {
        let provider = StatsProvider::new(Arc::new(IntakeQueue::new()), TaskTracker::new());
        let first = provider.snapshot();
        std::thread::sleep(Duration::from_millis(5));
        let second = provider.snapshot();

        assert!(second.uptime_seconds >= first.uptime_seconds);
        assert_eq!(second.uptime, second.uptime_seconds);
        assert!((second.uptime_minutes * 60.0 - second.uptime_seconds).abs() < 1e-9);
        assert!((second.uptime_hours * 3600.0 - second.uptime_seconds).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_active_tasks_counts_tracked_tasks() {
        let tracker = TaskTracker::new();
        let provider = StatsProvider::new(Arc::new(IntakeQueue::new()), tracker.clone());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tracker.spawn(async move {
            let _ = rx.await;
        });
        assert_eq!(provider.snapshot().active_tasks, 1);

        tx.send(()).unwrap();
        tracker.close();
        tracker.wait().await;
        assert_eq!(provider.snapshot().active_tasks, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_reads_own_process() {
        let provider = StatsProvider::new(Arc::new(IntakeQueue::new()), TaskTracker::new());
        assert!(provider.snapshot().total_memory > 0.0);
        assert!(provider.snapshot().total_memory > 0.0);
    }

    #[test]
    fn test_json_field_names() {
        let stats = StatsProvider::new(Arc::new(IntakeQueue::new()), TaskTracker::new()).snapshot();
        let json = serde_json::to_value(&stats).unwrap();
        for field in [
            "goroutines",
            "total_memory",
            "uptime",
            "uptime_hours",
            "uptime_minutes",
            "uptime_seconds",
            "queue_depth",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert!(json.get("active_tasks").is_none());
    }
}
