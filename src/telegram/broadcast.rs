//! Owner broadcast fan-out.
//!
//! A broadcast copies one message to every stored user in the background,
//! one recipient at a time with a fixed pause in between. Per-recipient
//! failures are counted and skipped. At most one broadcast runs at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::UserStore;
use crate::telegram::messenger::{BroadcastSource, Messenger};
use crate::telegram::texts;

/// Counts of a finished (or cancelled) broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: u64,
    pub failed: u64,
    pub cancelled: bool,
}

pub struct Broadcaster {
    store: Arc<dyn UserStore>,
    messenger: Arc<dyn Messenger>,
    delay: Duration,
    shutdown: CancellationToken,
    current: Mutex<Option<JoinHandle<BroadcastReport>>>,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn UserStore>, messenger: Arc<dyn Messenger>, delay: Duration) -> Self {
        Self {
            store,
            messenger,
            delay,
            shutdown: CancellationToken::new(),
            current: Mutex::new(None),
        }
    }

    /// Spawns a broadcast of `source`; the report is sent to `report_chat` when it ends.
    ///
    /// # Errors
    /// `BroadcastInProgress` while a previous broadcast is still running.
    pub async fn start(&self, source: BroadcastSource, report_chat: i64) -> AppResult<()> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(AppError::BroadcastInProgress);
        }

        let token = self.shutdown.child_token();
        let store = Arc::clone(&self.store);
        let messenger = Arc::clone(&self.messenger);
        let delay = self.delay;

        log::info!(
            "Broadcast of message {} from chat {} started",
            source.message_id,
            source.chat_id
        );
        let handle = tokio::spawn(async move {
            let report = run(store.as_ref(), messenger.as_ref(), &source, delay, &token).await;
            log::info!(
                "Broadcast finished: {} delivered, {} failed, cancelled: {}",
                report.delivered,
                report.failed,
                report.cancelled
            );
            let text = texts::broadcast_report(report.delivered, report.failed, report.cancelled);
            if let Err(e) = messenger.send_text(report_chat, &text).await {
                log::error!("Failed to send broadcast report to {}: {}", report_chat, e);
            }
            report
        });

        *current = Some(handle);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the running broadcast and every later one; used at shutdown.
    /// The partial report is still sent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for the last started broadcast and returns its report.
    pub async fn join(&self) -> Option<BroadcastReport> {
        let handle = self.current.lock().await.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                log::error!("Broadcast task failed: {}", e);
                None
            }
        }
    }
}

/// Walks the store page by page and copies `source` to every user.
pub async fn run(
    store: &dyn UserStore,
    messenger: &dyn Messenger,
    source: &BroadcastSource,
    delay: Duration,
    cancel: &CancellationToken,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let mut after = None;

    loop {
        let page = match store.list_page(after, config::broadcast::PAGE_SIZE).await {
            Ok(page) => page,
            Err(e) => {
                log::error!("Broadcast stopped, failed to list users after {:?}: {}", after, e);
                return report;
            }
        };
        let Some(last) = page.last() else {
            return report;
        };
        after = Some(last.id);

        for user in &page {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return report;
            }

            match messenger.copy_message(user.id, source).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("Broadcast to {} failed: {}", user.id, e);
                    report.failed += 1;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    return report;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if page.len() < config::broadcast::PAGE_SIZE {
            return report;
        }
    }
}
