use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::UsageRecord;
use crate::database::UsageLedger;

/// Receives the usage of every answered question. Implementations must not
/// block the caller.
pub trait UsageSink: Send + Sync {
    fn record(&self, record: UsageRecord);
}

/// Logs usage at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUsageSink;

impl UsageSink for LogUsageSink {
    #[inline]
    fn record(&self, record: UsageRecord) {
        info!(
            namespace = record.namespace.as_deref().unwrap_or("-"),
            model = %record.model,
            passages = record.passages,
            "Tokens used: {} (prompt: {}, completion: {}), estimated cost: ${:.6}",
            record.usage.total_tokens(),
            record.usage.prompt_tokens,
            record.usage.completion_tokens,
            record.cost
        );
    }
}

/// Logs usage and appends it to the usage ledger on a background task
#[derive(Debug)]
pub struct LedgerUsageSink {
    ledger: Arc<UsageLedger>,
    pending: Mutex<JoinSet<()>>,
}

impl LedgerUsageSink {
    #[inline]
    pub fn new(ledger: Arc<UsageLedger>) -> Self {
        Self {
            ledger,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Wait for every write started so far
    #[inline]
    pub async fn flush(&self) {
        let mut pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!("Usage recording task failed: {}", e);
            }
        }
    }
}

impl UsageSink for LedgerUsageSink {
    #[inline]
    fn record(&self, record: UsageRecord) {
        LogUsageSink.record(record.clone());

        let ledger = Arc::clone(&self.ledger);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop writes that already finished
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match ledger.record(&record).await {
                Ok(stored) => debug!("Recorded usage {}", stored.id),
                Err(e) => warn!("Failed to record usage: {}", e),
            }
        });
    }
}
