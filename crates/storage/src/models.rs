//! Record Types

use crate::{Result, StorageError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Device record, owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

/// Largest accepted reading magnitude; keeps pooled sums finite
pub const MAX_READING_MAGNITUDE: f64 = 1.0e12;

/// One triaxial motion sample of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeviceStat {
    pub id: i64,
    pub device_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Nanoseconds since the Unix epoch (UTC)
    pub timestamp_ns: i64,
}

impl DeviceStat {
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.timestamp_ns)
    }
}

/// Sample to insert; the store stamps the current time when `timestamp` is absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDeviceStat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewDeviceStat {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (axis, value) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !value.is_finite() {
                return Err(StorageError::InvalidInput(format!(
                    "{axis} reading must be finite, got {value}"
                )));
            }
            if value.abs() > MAX_READING_MAGNITUDE {
                return Err(StorageError::InvalidInput(format!(
                    "{axis} reading {value} exceeds magnitude {MAX_READING_MAGNITUDE}"
                )));
            }
        }
        if let Some(timestamp) = self.timestamp {
            to_nanos(timestamp)?;
        }
        Ok(())
    }

    /// Stored timestamp, defaulting to now
    pub(crate) fn timestamp_ns(&self) -> Result<i64> {
        to_nanos(self.timestamp.unwrap_or_else(Utc::now))
    }
}

fn to_nanos(timestamp: DateTime<Utc>) -> Result<i64> {
    timestamp.timestamp_nanos_opt().ok_or_else(|| {
        StorageError::InvalidInput(format!("timestamp {timestamp} is outside the storable range"))
    })
}

/// Inclusive time range; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    /// Bounds in stored nanoseconds, `None` when no storable timestamp can match
    ///
    /// A bound past the storable range on its open side is dropped.
    pub(crate) fn nanos_bounds(&self) -> Option<(Option<i64>, Option<i64>)> {
        let start = match self.start {
            None => None,
            Some(t) => match t.timestamp_nanos_opt() {
                Some(ns) => Some(ns),
                None if t.timestamp() < 0 => None,
                None => return None,
            },
        };
        let end = match self.end {
            None => None,
            Some(t) => match t.timestamp_nanos_opt() {
                Some(ns) => Some(ns),
                None if t.timestamp() > 0 => None,
                None => return None,
            },
        };
        Some((start, end))
    }
}

/// Trim a user-supplied name; blank names are rejected
pub(crate) fn normalize_name(field: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}
