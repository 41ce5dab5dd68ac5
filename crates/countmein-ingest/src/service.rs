//! The ingest pipeline: validate, transform, write.

use std::sync::Arc;

use countmein_types::{Announcement, ANNOUNCEMENT_TABLE};
use tracing::Span;

use crate::error::{IngestError, StoreError};
use crate::record::to_records;
use crate::store::AnnouncementStore;
use crate::validate::{ValidationError, ValidationPolicy};

/// Runs submissions through validation and into the store's
/// `announcement` table, the same table the count query reads.
///
/// All diagnostics are emitted inside the span handed to [`Ingestor::new`],
/// so the owner decides where and under what context they are reported.
/// Methods block on the store and belong on a blocking thread.
pub struct Ingestor {
    store: Arc<dyn AnnouncementStore>,
    policy: ValidationPolicy,
    span: Span,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn AnnouncementStore>,
        policy: ValidationPolicy,
        span: Span,
    ) -> Self {
        Self {
            store,
            policy,
            span,
        }
    }

    /// Validates the whole batch, then stamps and writes every announcement.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// `IngestError::Rejected` if any announcement fails validation (nothing
    /// is written); `IngestError::Persist` if a chunk write fails.
    pub fn ingest(&self, batch: Vec<Announcement>) -> Result<usize, IngestError> {
        let _entered = self.span.enter();

        let now = chrono::Utc::now().timestamp();
        if let Err(rejection) = self.policy.validate_all(&batch, now) {
            match &rejection.reason {
                ValidationError::TimeOutOfRange { time, .. } => tracing::info!(
                    index = rejection.index,
                    user_id = %rejection.user_id,
                    time,
                    "invalid announcement time: {}",
                    rejection.reason
                ),
                reason => tracing::debug!(
                    index = rejection.index,
                    user_id = %rejection.user_id,
                    "invalid announcement: {}",
                    reason
                ),
            }
            return Err(rejection.into());
        }

        let records = to_records(batch);
        self.store.insert(ANNOUNCEMENT_TABLE, &records)?;

        tracing::debug!(count = records.len(), "stored announcements");
        Ok(records.len())
    }

    /// Distinct observed devices reported after `since`, excluding the
    /// simulator.
    pub fn count_distinct_devices(&self, since: i64) -> Result<i64, StoreError> {
        let _entered = self.span.enter();

        self.store.count_distinct_devices(since).map_err(|e| {
            tracing::error!(since, error = %e, "failed to count distinct devices");
            e
        })
    }
}
