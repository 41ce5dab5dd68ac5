//! Announcement ingest pipeline.
//!
//! Takes announcements decoded from a client submission, validates the
//! batch as a whole, turns each announcement into a persisted record and
//! writes the records in bounded chunks through an [`AnnouncementStore`].
//! The same store answers the distinct-device count used to estimate how
//! many participants are currently present.
//!
//! # Pipeline
//!
//! | Step | Item |
//! |------|------|
//! | validate | [`ValidationPolicy::validate_all`] |
//! | transform | [`to_records`] |
//! | write | [`AnnouncementStore::insert`] (chunks of 99, then 100) |
//! | count | [`AnnouncementStore::count_distinct_devices`] |
//!
//! [`Ingestor`] strings the first three together.
//!
//! # Usage
//!
//! ```rust,ignore
//! use countmein_ingest::{Ingestor, SqliteStore, ValidationPolicy};
//!
//! let store = Arc::new(SqliteStore::new(pool));
//! let ingestor = Ingestor::new(
//!     store,
//!     ValidationPolicy::default(),
//!     tracing::info_span!("ingest"),
//! );
//! let written = ingestor.ingest(announcements)?;
//! ```

mod batch;
mod error;
mod memory;
mod record;
mod service;
mod sqlite;
mod store;
mod validate;

pub use batch::{chunk_bounds, write_chunks, ChunkBounds, CHUNK_LEN, FIRST_CHUNK_LEN};
pub use error::{IngestError, StoreError};
pub use memory::MemoryStore;
pub use record::{to_record, to_record_at, to_records};
pub use service::Ingestor;
pub use sqlite::{SqlRow, SqliteStore};
pub use store::{AnnouncementStore, COUNT_UNAVAILABLE};
pub use validate::{
    DeviceField, Rejection, ValidationError, ValidationPolicy, MAX_CLOCK_SKEW_SECS,
    MAX_FIELD_CHARS, SERVICE_EPOCH_FLOOR,
};

#[cfg(test)]
mod tests;
