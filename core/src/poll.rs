// 轮询器：定时拉取扫描状态，送达每次读数，见到终态后自行停止

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::model::ScanStatusRecord;

/// 可被轮询的状态来源
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, scan_id: &str) -> Result<ScanStatusRecord>;
}

/// 一次轮询的句柄。cancel 可重复调用，任务结束后调用无副作用。
/// 丢弃句柄不会停止轮询，调用方需要显式取消。
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// 立即拉取一次，之后每 interval 拉取一次。
/// 每次成功读数都无条件送达 on_update，即使内容没有变化；
/// 送达终态读数后任务退出；单次失败记日志并在下个周期继续。
pub fn start_polling<S, F>(
    source: Arc<S>,
    scan_id: impl Into<String>,
    interval: Duration,
    mut on_update: F,
) -> PollHandle
where
    S: StatusSource + ?Sized + 'static,
    F: FnMut(ScanStatusRecord) + Send + 'static,
{
    let scan_id = scan_id.into();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match source.fetch_status(&scan_id).await {
                Ok(record) => {
                    let terminal = record.status.is_terminal();
                    on_update(record);
                    if terminal {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("poll for scan {} failed: {}", scan_id, err);
                }
            }
        }
    });

    PollHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::model::ScanStatus;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<ScanStatusRecord>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<ScanStatusRecord>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _scan_id: &str) -> Result<ScanStatusRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScanError::BackendUnavailable("script exhausted".into())))
        }
    }

    fn reading(status: ScanStatus, progress: u8) -> ScanStatusRecord {
        ScanStatusRecord {
            scan_id: "s1".into(),
            company_name: "Acme".into(),
            domain: "acme.com".into(),
            status,
            progress,
            current_module: None,
            total_modules: 11,
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    fn collector() -> (Arc<Mutex<Vec<ScanStatusRecord>>>, impl FnMut(ScanStatusRecord) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |record| sink.lock().unwrap().push(record))
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_happens_immediately() {
        let source = ScriptedSource::new(vec![Ok(reading(ScanStatus::Running, 10))]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        // 未推进模拟时钟，只让任务跑到第一次 tick
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(source.calls(), 1);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_delivering_terminal_status() {
        let source = ScriptedSource::new(vec![
            Ok(reading(ScanStatus::Running, 20)),
            Ok(reading(ScanStatus::Running, 60)),
            Ok(reading(ScanStatus::Completed, 100)),
        ]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        // 留出远超三个周期的时间，终态之后不应再有任何调用
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(handle.is_finished());
        assert_eq!(source.calls(), 3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].status, ScanStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_terminal_status_also_stops_polling() {
        let source = ScriptedSource::new(vec![Ok(reading(ScanStatus::Failed, 30))]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(handle.is_finished());
        assert_eq!(source.calls(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_failure_does_not_stop_the_timer() {
        let source = ScriptedSource::new(vec![
            Err(ScanError::BackendUnavailable("connection refused".into())),
            Ok(reading(ScanStatus::Running, 50)),
            Ok(reading(ScanStatus::Completed, 100)),
        ]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(handle.is_finished());
        assert_eq!(source.calls(), 3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].status, ScanStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_readings_are_still_delivered() {
        let source = ScriptedSource::new(vec![
            Ok(reading(ScanStatus::Running, 40)),
            Ok(reading(ScanStatus::Running, 40)),
            Ok(reading(ScanStatus::Completed, 100)),
        ]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(handle.is_finished());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling_and_is_idempotent() {
        let source = ScriptedSource::new(vec![
            Ok(reading(ScanStatus::Running, 10)),
            Ok(reading(ScanStatus::Running, 20)),
            Ok(reading(ScanStatus::Running, 30)),
        ]);
        let (seen, on_update) = collector();

        let handle = start_polling(
            Arc::clone(&source),
            "s1",
            Duration::from_secs(5),
            on_update,
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.cancel();
        handle.cancel();

        let delivered = seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(seen.lock().unwrap().len(), delivered);
        assert_eq!(source.calls(), delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn scans_are_polled_independently() {
        let fast = ScriptedSource::new(vec![Ok(reading(ScanStatus::Completed, 100))]);
        let slow = ScriptedSource::new(vec![
            Ok(reading(ScanStatus::Running, 10)),
            Ok(reading(ScanStatus::Completed, 100)),
        ]);
        let (seen_fast, on_fast) = collector();
        let (seen_slow, on_slow) = collector();

        let h1 = start_polling(Arc::clone(&fast), "s1", Duration::from_secs(5), on_fast);
        let h2 = start_polling(Arc::clone(&slow), "s2", Duration::from_secs(5), on_slow);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h1.is_finished());
        assert!(h2.is_finished());
        assert_eq!(seen_fast.lock().unwrap().len(), 1);
        assert_eq!(seen_slow.lock().unwrap().len(), 2);
    }
}
