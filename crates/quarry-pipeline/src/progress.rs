use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use quarry_config::Config;

use crate::messages::{OutboundMessage, ProgressReport};
use crate::queues::QueueBundle;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Shared counters for progress reporting.
#[derive(Default)]
pub struct ImportPipelineStatus {
    pub num_active_threads: AtomicI64,
    next_progress_output: AtomicI64,
}

/// Scoped acquisition of the active-thread counter. The decrement and a
/// progress emission run on every exit path.
pub struct ActiveThread<'a> {
    config: &'a Config,
    status: &'a ImportPipelineStatus,
    queues: &'a QueueBundle,
}

impl<'a> ActiveThread<'a> {
    pub fn new(config: &'a Config, status: &'a ImportPipelineStatus, queues: &'a QueueBundle) -> Self {
        if config.progress_report_frequency_ms >= 0 {
            status.num_active_threads.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            config,
            status,
            queues,
        }
    }
}

impl Drop for ActiveThread<'_> {
    fn drop(&mut self) {
        if self.config.progress_report_frequency_ms < 0 {
            return;
        }
        self.status.num_active_threads.fetch_sub(1, Ordering::SeqCst);
        emit_progress(self.config, self.status, self.queues);
    }
}

/// Send indexing progress to the client if reporting is enabled.
///
/// With a positive interval only the all-zero "everything drained" report
/// is emitted, and at most once per interval; interval 0 reports every
/// event.
pub fn emit_progress(config: &Config, status: &ImportPipelineStatus, queues: &QueueBundle) {
    if config.progress_report_frequency_ms < 0 {
        return;
    }

    let report = ProgressReport {
        index_request_count: queues.index_request.size(),
        do_id_map_count: queues.do_id_map.size(),
        load_previous_index_count: queues.load_previous_index.size(),
        on_id_mapped_count: queues.on_id_mapped.size(),
        on_indexed_count: queues.on_indexed.size(),
        active_threads: status.num_active_threads.load(Ordering::SeqCst),
    };

    if config.progress_report_frequency_ms != 0 {
        if !report.is_all_zero()
            || now_millis() < status.next_progress_output.load(Ordering::SeqCst)
        {
            return;
        }
        status.next_progress_output.store(
            now_millis() + config.progress_report_frequency_ms,
            Ordering::SeqCst,
        );
    }

    queues
        .stdout
        .enqueue(OutboundMessage::notification("$quarry/progress", &report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_queue::MultiQueueWaiter;
    use std::sync::Arc;

    fn bundle() -> Arc<QueueBundle> {
        QueueBundle::new(
            MultiQueueWaiter::new(),
            MultiQueueWaiter::new(),
            MultiQueueWaiter::new(),
        )
    }

    fn config_with_frequency(ms: i64) -> Config {
        Config {
            progress_report_frequency_ms: ms,
            ..Config::default()
        }
    }

    #[test]
    fn negative_frequency_disables_reporting() {
        let config = config_with_frequency(-1);
        let status = ImportPipelineStatus::default();
        let queues = bundle();

        {
            let _active = ActiveThread::new(&config, &status, &queues);
            assert_eq!(status.num_active_threads.load(Ordering::SeqCst), 0);
        }
        assert_eq!(queues.stdout.size(), 0);
    }

    #[test]
    fn zero_frequency_reports_every_event() {
        let config = config_with_frequency(0);
        let status = ImportPipelineStatus::default();
        let queues = bundle();

        { let _active = ActiveThread::new(&config, &status, &queues); }
        { let _active = ActiveThread::new(&config, &status, &queues); }
        assert_eq!(queues.stdout.size(), 2);
    }

    #[test]
    fn positive_frequency_throttles_all_zero_reports() {
        let config = config_with_frequency(60_000);
        let status = ImportPipelineStatus::default();
        let queues = bundle();

        // First drop emits (window starts empty), second is inside the
        // throttle window.
        { let _active = ActiveThread::new(&config, &status, &queues); }
        { let _active = ActiveThread::new(&config, &status, &queues); }
        assert_eq!(queues.stdout.size(), 1);
    }

    #[test]
    fn positive_frequency_defers_busy_snapshots() {
        let config = config_with_frequency(60_000);
        let status = ImportPipelineStatus::default();
        let queues = bundle();

        // A non-zero queue depth never emits under a positive interval.
        queues.index_request.enqueue(crate::queues::IndexRequest::new(
            "/p/foo.cc",
            Vec::new(),
            false,
            "",
        ));
        { let _active = ActiveThread::new(&config, &status, &queues); }
        assert_eq!(queues.stdout.size(), 0);
    }
}
