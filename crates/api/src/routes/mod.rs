//! Route handlers

pub mod devices;
pub mod samples;
pub mod stats;
pub mod users;

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use storage::TimeWindow;

/// Optional inclusive time bounds, RFC 3339
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl WindowQuery {
    pub fn to_window(&self) -> Result<TimeWindow, ApiError> {
        let window = TimeWindow::new(self.start_time, self.end_time);
        if window.is_inverted() {
            return Err(ApiError::bad_request("start_time must not be after end_time"));
        }
        Ok(window)
    }
}
