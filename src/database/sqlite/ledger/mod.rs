
use std::path::Path;

use tracing::debug;

use super::models::{StoredUsage, UsageSummary};
use super::queries::UsageQueries;
use super::{Database, USAGE_MIGRATOR};
use crate::responder::UsageRecord;
use crate::{AskPdfError, Result};

/// Persistent record of every answer's token usage and estimated cost
#[derive(Debug, Clone)]
pub struct UsageLedger {
    database: Database,
}

impl UsageLedger {
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database = Database::new(path, &USAGE_MIGRATOR)
            .await
            .map_err(database_error)?;
        debug!("Opened usage ledger at {}", path.display());

        Ok(Self { database })
    }

    #[inline]
    pub async fn record(&self, record: &UsageRecord) -> Result<StoredUsage> {
        UsageQueries::insert(self.database.pool(), record)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn recent(&self, limit: usize) -> Result<Vec<StoredUsage>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        UsageQueries::list_recent(self.database.pool(), limit)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn summary(&self) -> Result<UsageSummary> {
        let overall = UsageQueries::totals(self.database.pool())
            .await
            .map_err(database_error)?;
        let per_namespace = UsageQueries::totals_by_namespace(self.database.pool())
            .await
            .map_err(database_error)?;

        Ok(UsageSummary {
            overall,
            per_namespace,
        })
    }
}

fn database_error(error: anyhow::Error) -> AskPdfError {
    AskPdfError::Database(format!("{:#}", error))
}
