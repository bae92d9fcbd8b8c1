//! Bootstrap Seeding
//!
//! Loads a fixed dataset into a completely empty store. Any existing row in
//! any table blocks seeding.

use crate::repository::{insert_device, insert_stat, insert_user};
use crate::{NewDeviceStat, Repository, Result, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Seed file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedData {
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub devices: Vec<SeedDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDevice {
    pub name: String,
    pub stats: Vec<SeedStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedStat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SeedStat {
    fn to_new_stat(&self) -> NewDeviceStat {
        NewDeviceStat {
            x: self.x,
            y: self.y,
            z: self.z,
            timestamp: self.timestamp,
        }
    }
}

impl SeedData {
    /// Reject content that would fail halfway through the load
    pub fn validate(&self) -> Result<()> {
        for user in &self.users {
            if user.username.trim().is_empty() {
                return Err(StorageError::InvalidInput("seed user with blank username".into()));
            }
            for device in &user.devices {
                if device.name.trim().is_empty() {
                    return Err(StorageError::InvalidInput(format!(
                        "seed device with blank name for user {}",
                        user.username
                    )));
                }
                for stat in &device.stats {
                    stat.to_new_stat().validate()?;
                }
            }
        }
        Ok(())
    }
}

/// Rows written by a seed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub devices: usize,
    pub stats: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store already held data
    Skipped,
    Seeded(SeedReport),
}

/// Read and validate a seed file
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<SeedData> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StorageError::SeedFile {
            path: path.display().to_string(),
            source,
        })?;
    let data: SeedData = serde_json::from_str(&raw)?;
    data.validate()?;
    Ok(data)
}

/// Seed from `path` when users, devices and samples are all empty
///
/// The file is only read when seeding will actually happen.
#[instrument(skip_all)]
pub async fn seed_if_empty(repository: &Repository, path: impl AsRef<Path>) -> Result<SeedOutcome> {
    let counts = repository.counts().await?;
    if !counts.is_empty() {
        info!(?counts, "Store already holds data, skipping seed");
        return Ok(SeedOutcome::Skipped);
    }

    let data = load_seed_file(path).await?;
    seed_from_data(repository, &data).await
}

/// Seed from already-parsed data when the store is empty
///
/// Everything is written in one transaction: users, then their devices,
/// then the samples of each device.
pub async fn seed_from_data(repository: &Repository, data: &SeedData) -> Result<SeedOutcome> {
    data.validate()?;

    let mut tx = repository.pool().begin().await?;

    let occupied: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM users) + (SELECT COUNT(*) FROM devices) + (SELECT COUNT(*) FROM device_stats)",
    )
    .fetch_one(&mut *tx)
    .await?;
    if occupied > 0 {
        info!(rows = occupied, "Store already holds data, skipping seed");
        return Ok(SeedOutcome::Skipped);
    }

    let mut report = SeedReport::default();
    for seed_user in &data.users {
        let user = insert_user(&mut tx, &seed_user.username).await?;
        report.users += 1;

        for seed_device in &seed_user.devices {
            let device = insert_device(&mut tx, &seed_device.name, user.id).await?;
            report.devices += 1;

            for seed_stat in &seed_device.stats {
                insert_stat(&mut tx, device.id, &seed_stat.to_new_stat()).await?;
                report.stats += 1;
            }
        }
    }

    tx.commit().await?;

    info!(
        users = report.users,
        devices = report.devices,
        stats = report.stats,
        "Seeded store"
    );
    Ok(SeedOutcome::Seeded(report))
}
