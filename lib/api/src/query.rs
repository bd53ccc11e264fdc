//! Query parameters for the history endpoint.

use bpm_dashboard_core::DeviceId;

/// Filters for `/bpm/history`. Unset fields are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum number of measurements to return.
    pub limit: Option<u32>,
    /// Only measurements from this device.
    pub device_id: Option<DeviceId>,
    /// Earliest timestamp, ISO-8601, passed through unchanged.
    pub start_date: Option<String>,
    /// Latest timestamp, ISO-8601, passed through unchanged.
    pub end_date: Option<String>,
}

impl HistoryQuery {
    /// Creates an unfiltered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the number of measurements.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filters by device.
    #[must_use]
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Sets the earliest timestamp.
    #[must_use]
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Sets the latest timestamp.
    #[must_use]
    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    /// Returns the query pairs in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(device_id) = &self.device_id {
            pairs.push(("device_id", device_id.to_string()));
        }
        if let Some(start_date) = &self.start_date {
            pairs.push(("start_date", start_date.clone()));
        }
        if let Some(end_date) = &self.end_date {
            pairs.push(("end_date", end_date.clone()));
        }
        pairs
    }
}
