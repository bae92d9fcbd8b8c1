//! Store-backed aggregation
//!
//! A missing user or device is reported as `Ok(None)`; an existing device
//! with no samples in range yields the empty summary.

use serde::{Deserialize, Serialize};
use stats_engine::{aggregate, Sample, Summary};
use storage::{Device, DeviceStat, Repository, StorageError, TimeWindow};
use tracing::debug;

/// Wire form of a [`Summary`]; min, max and median are `null` when there is no data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub total_count: usize,
    pub total_sum: f64,
    pub median: Option<f64>,
}

impl From<Summary> for AnalysisResults {
    fn from(summary: Summary) -> Self {
        Self {
            min_value: summary.min(),
            max_value: summary.max(),
            total_count: summary.total_count,
            total_sum: summary.total_sum,
            median: summary.median,
        }
    }
}

/// Per-device entry of the user and fleet reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAnalysis {
    pub device_id: i64,
    pub device_name: String,
    pub analysis_results: AnalysisResults,
}

fn to_samples(stats: &[DeviceStat]) -> impl Iterator<Item = Sample> + '_ {
    stats.iter().map(|s| Sample::new(s.x, s.y, s.z))
}

async fn summarize(
    repository: &Repository,
    device_id: i64,
    window: TimeWindow,
) -> Result<Summary, StorageError> {
    let stats = repository.list_stats_for_device(device_id, window).await?;
    let summary = aggregate(to_samples(&stats));
    debug!(device_id, samples = summary.total_count, "Summarized device");
    Ok(summary)
}

async fn analyze_devices(
    repository: &Repository,
    devices: Vec<Device>,
) -> Result<Vec<DeviceAnalysis>, StorageError> {
    let mut results = Vec::with_capacity(devices.len());
    for device in devices {
        let summary = summarize(repository, device.id, TimeWindow::unbounded()).await?;
        results.push(DeviceAnalysis {
            device_id: device.id,
            device_name: device.name,
            analysis_results: summary.into(),
        });
    }
    Ok(results)
}

/// Summary of one device's samples inside `window` (bounds inclusive)
pub async fn aggregate_over_window(
    repository: &Repository,
    device_id: i64,
    window: TimeWindow,
) -> Result<Option<Summary>, StorageError> {
    if repository.get_device(device_id).await?.is_none() {
        return Ok(None);
    }
    summarize(repository, device_id, window).await.map(Some)
}

/// All-time summary of every device the user owns
pub async fn aggregate_for_user(
    repository: &Repository,
    user_id: i64,
) -> Result<Option<Vec<DeviceAnalysis>>, StorageError> {
    if repository.get_user(user_id).await?.is_none() {
        return Ok(None);
    }
    let devices = repository.list_devices_for_user(user_id).await?;
    analyze_devices(repository, devices).await.map(Some)
}

/// All-time summary of one device, only if `user_id` owns it
pub async fn aggregate_for_user_device(
    repository: &Repository,
    user_id: i64,
    device_id: i64,
) -> Result<Option<Summary>, StorageError> {
    if repository.get_user(user_id).await?.is_none() {
        return Ok(None);
    }
    if repository
        .get_device_for_user(user_id, device_id)
        .await?
        .is_none()
    {
        return Ok(None);
    }
    summarize(repository, device_id, TimeWindow::unbounded())
        .await
        .map(Some)
}

/// All-time summary of every device in the store
pub async fn aggregate_for_all_devices(
    repository: &Repository,
) -> Result<Vec<DeviceAnalysis>, StorageError> {
    let devices = repository.list_all_devices().await?;
    analyze_devices(repository, devices).await
}
