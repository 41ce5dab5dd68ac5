//! Shared data model for the countmein service.
//!
//! This crate defines the wire form of an announcement (what clients POST),
//! the persisted form written to the `announcement` table, and the constants
//! both sides agree on. It has no I/O and no dependencies beyond `serde`, so
//! every other crate in the workspace can depend on it freely.

use serde::{Deserialize, Serialize};

/// Name of the table announcement records are written to.
pub const ANNOUNCEMENT_TABLE: &str = "announcement";

/// Reserved `user_id` marking synthetic traffic from the simulator.
///
/// Records carrying this user are stored like any other but never counted
/// by the distinct-device query.
pub const SIMULATOR_USER_ID: &str = "Simulator";

/// A device as identified by the client: an opaque id plus a free-form
/// type label (e.g. a phone model). Both may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Opaque device identifier.
    pub id: String,
    /// Device type label.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
        }
    }
}

/// Geographic position in degrees. No range checking is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A client-submitted assertion that `user_device` saw `seen_device` at
/// `location` at `time` (seconds since the Unix epoch).
///
/// Missing fields decode to their zero value; acceptance is decided by the
/// validator, not by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Announcement {
    /// The reporting user.
    pub user_id: String,
    /// The reporting device.
    #[serde(rename = "device_id")]
    pub user_device: Device,
    /// The observed device.
    pub seen_device: Device,
    pub location: Location,
    /// Caller-supplied timestamp, seconds since epoch.
    pub time: i64,
}

/// One row of the `announcement` table.
///
/// Created once per accepted [`Announcement`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    /// Server-generated unique identifier.
    pub id: String,
    pub user_id: String,
    pub user_device_id: String,
    pub user_device_type: String,
    pub seen_device_id: String,
    pub seen_device_type: String,
    pub location_latitude: f64,
    pub location_longitude: f64,
    /// Timestamp supplied by the caller.
    pub user_time: i64,
    /// Timestamp assigned by the server when the record was built.
    pub server_time: i64,
}
