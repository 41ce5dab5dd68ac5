//! Acceptance rules for submitted announcements.
//!
//! Validation is pure: the caller passes the current time in, and failures
//! come back as values. Logging the reason is the caller's job, the HTTP
//! client only ever learns that the batch was rejected.

use countmein_types::Announcement;
use thiserror::Error;

/// Earliest accepted announcement time: the moment the service went live.
pub const SERVICE_EPOCH_FLOOR: i64 = 1_678_133_631;

/// How far ahead of the server clock a client timestamp may be.
pub const MAX_CLOCK_SKEW_SECS: i64 = 2 * 60 * 60;

/// Upper bound, in characters, for user ids and device ids/types.
pub const MAX_FIELD_CHARS: usize = 48;

/// Which device string failed the length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceField {
    UserDeviceId,
    UserDeviceType,
    SeenDeviceId,
    SeenDeviceType,
}

impl DeviceField {
    /// Column name of the field in the persisted record.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserDeviceId => "user_device_id",
            Self::UserDeviceType => "user_device_type",
            Self::SeenDeviceId => "seen_device_id",
            Self::SeenDeviceType => "seen_device_type",
        }
    }
}

impl std::fmt::Display for DeviceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single announcement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("time {time} outside accepted range [{floor}, {ceiling}]")]
    TimeOutOfRange { time: i64, floor: i64, ceiling: i64 },

    #[error("user id {user_id:?} has {len} characters, expected 1..={MAX_FIELD_CHARS}")]
    UserIdLength { user_id: String, len: usize },

    #[error("{field} {value:?} has {len} characters, expected at most {MAX_FIELD_CHARS}")]
    FieldTooLong {
        field: DeviceField,
        value: String,
        len: usize,
    },
}

/// A rejected batch: the position of the first offending announcement and
/// the reason it was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("announcement {index} from user {user_id:?} rejected: {reason}")]
pub struct Rejection {
    pub index: usize,
    pub user_id: String,
    #[source]
    pub reason: ValidationError,
}

/// Bounds applied to every announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Inclusive lower bound on `time`.
    pub time_floor: i64,
    /// `time` may not exceed `now + max_clock_skew_secs`.
    pub max_clock_skew_secs: i64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            time_floor: SERVICE_EPOCH_FLOOR,
            max_clock_skew_secs: MAX_CLOCK_SKEW_SECS,
        }
    }
}

impl ValidationPolicy {
    /// Checks one announcement against the policy at server time `now`.
    ///
    /// Checks run in a fixed order (time, user id, then the four device
    /// strings) and the first failure is returned.
    pub fn validate(&self, announcement: &Announcement, now: i64) -> Result<(), ValidationError> {
        let ceiling = now.saturating_add(self.max_clock_skew_secs);
        if announcement.time < self.time_floor || announcement.time > ceiling {
            return Err(ValidationError::TimeOutOfRange {
                time: announcement.time,
                floor: self.time_floor,
                ceiling,
            });
        }

        let len = announcement.user_id.chars().count();
        if len == 0 || len > MAX_FIELD_CHARS {
            return Err(ValidationError::UserIdLength {
                user_id: announcement.user_id.clone(),
                len,
            });
        }

        let device_fields = [
            (DeviceField::UserDeviceId, &announcement.user_device.id),
            (DeviceField::UserDeviceType, &announcement.user_device.kind),
            (DeviceField::SeenDeviceId, &announcement.seen_device.id),
            (DeviceField::SeenDeviceType, &announcement.seen_device.kind),
        ];
        for (field, value) in device_fields {
            let len = value.chars().count();
            if len > MAX_FIELD_CHARS {
                return Err(ValidationError::FieldTooLong {
                    field,
                    value: value.clone(),
                    len,
                });
            }
        }

        Ok(())
    }

    /// Checks a whole submission. One bad announcement rejects the batch.
    pub fn validate_all(&self, batch: &[Announcement], now: i64) -> Result<(), Rejection> {
        for (index, announcement) in batch.iter().enumerate() {
            self.validate(announcement, now).map_err(|reason| Rejection {
                index,
                user_id: announcement.user_id.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}
