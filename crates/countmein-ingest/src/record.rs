//! Conversion from accepted announcements to persisted records.

use countmein_types::{Announcement, AnnouncementRecord};
use uuid::Uuid;

/// Builds the persisted form of `announcement`, stamping it with a fresh
/// UUID and the given server time.
///
/// Callers must validate first; nothing is checked here.
pub fn to_record_at(announcement: Announcement, server_time: i64) -> AnnouncementRecord {
    let Announcement {
        user_id,
        user_device,
        seen_device,
        location,
        time,
    } = announcement;

    AnnouncementRecord {
        id: Uuid::new_v4().to_string(),
        user_id,
        user_device_id: user_device.id,
        user_device_type: user_device.kind,
        seen_device_id: seen_device.id,
        seen_device_type: seen_device.kind,
        location_latitude: location.latitude,
        location_longitude: location.longitude,
        user_time: time,
        server_time,
    }
}

/// Like [`to_record_at`], using the current server clock.
pub fn to_record(announcement: Announcement) -> AnnouncementRecord {
    to_record_at(announcement, chrono::Utc::now().timestamp())
}

/// Converts a validated batch, preserving order. Every record gets its own
/// id and a fresh clock reading.
pub fn to_records(batch: Vec<Announcement>) -> Vec<AnnouncementRecord> {
    batch.into_iter().map(to_record).collect()
}
