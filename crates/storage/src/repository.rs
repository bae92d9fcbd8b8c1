//! Repository Implementation

use crate::models::normalize_name;
use crate::{schema, Device, DeviceStat, NewDeviceStat, Result, StorageError, TimeWindow, User};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

const STAT_COLUMNS: &str = "id, device_id, x, y, z, timestamp_ns";

/// Row counts of the three tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub users: i64,
    pub devices: i64,
    pub device_stats: i64,
}

impl StoreCounts {
    /// True only when every table is empty
    pub fn is_empty(&self) -> bool {
        self.users == 0 && self.devices == 0 && self.device_stats == 0
    }
}

/// Repository for data access backed by a SQLite connection pool
///
/// Every call checks a connection out of the pool and returns it when the
/// call finishes, whether it succeeded or not.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open (creating if needed) a SQLite database and apply the schema
    pub async fn with_sqlite(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            // each connection to :memory: is a separate database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        } else {
            pool_options = pool_options.max_connections(max_connections.max(1));
        }

        let pool = pool_options.connect_with(options).await?;
        let repository = Self { pool };
        repository.migrate().await?;

        info!(url = database_url, "Opened SQLite repository");
        Ok(repository)
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        Self::with_sqlite("sqlite::memory:", 1).await
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for statement in schema::ALL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ---- users ----

    #[instrument(skip(self))]
    pub async fn create_user(&self, username: &str) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        let user = insert_user(&mut conn, username).await?;
        debug!(user_id = user.id, "Inserted user");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT id, username FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: i64, username: &str) -> Result<Option<User>> {
        let username = normalize_name("username", username)?;
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET username = ? WHERE id = ? RETURNING id, username",
        )
        .bind(username)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Delete a user; refused while the user still owns devices
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let Some(user) = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let devices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE user_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if devices > 0 {
            return Err(StorageError::HasDependents {
                entity: "user",
                id,
                dependents: "devices",
                count: devices,
            });
        }

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = id, "Deleted user");
        Ok(Some(user))
    }

    // ---- devices ----

    #[instrument(skip(self))]
    pub async fn create_device(&self, name: &str, user_id: i64) -> Result<Device> {
        let mut tx = self.pool.begin().await?;
        let device = insert_device(&mut tx, name, user_id).await?;
        tx.commit().await?;
        debug!(device_id = device.id, "Inserted device");
        Ok(device)
    }

    #[instrument(skip(self))]
    pub async fn get_device(&self, id: i64) -> Result<Option<Device>> {
        let device =
            sqlx::query_as::<_, Device>("SELECT id, name, user_id FROM devices WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(device)
    }

    #[instrument(skip(self))]
    pub async fn get_device_by_name(&self, name: &str) -> Result<Option<Device>> {
        let device =
            sqlx::query_as::<_, Device>("SELECT id, name, user_id FROM devices WHERE name = ?")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(device)
    }

    /// Device with `device_id` only if `user_id` owns it
    #[instrument(skip(self))]
    pub async fn get_device_for_user(&self, user_id: i64, device_id: i64) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT id, name, user_id FROM devices WHERE id = ? AND user_id = ?",
        )
        .bind(device_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    /// Page through all devices ordered by id
    pub async fn list_devices(&self, skip: i64, limit: i64) -> Result<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            "SELECT id, name, user_id FROM devices ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit.max(0))
        .bind(skip.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(devices)
    }

    pub async fn list_all_devices(&self) -> Result<Vec<Device>> {
        let devices =
            sqlx::query_as::<_, Device>("SELECT id, name, user_id FROM devices ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(devices)
    }

    pub async fn list_devices_for_user(&self, user_id: i64) -> Result<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            "SELECT id, name, user_id FROM devices WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(devices)
    }

    #[instrument(skip(self))]
    pub async fn update_device(&self, id: i64, name: &str) -> Result<Option<Device>> {
        let name = normalize_name("device name", name)?;
        let device = sqlx::query_as::<_, Device>(
            "UPDATE devices SET name = ? WHERE id = ? RETURNING id, name, user_id",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    /// Delete a device; refused while the device still has samples
    #[instrument(skip(self))]
    pub async fn delete_device(&self, id: i64) -> Result<Option<Device>> {
        let mut tx = self.pool.begin().await?;

        let Some(device) =
            sqlx::query_as::<_, Device>("SELECT id, name, user_id FROM devices WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        let stats: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM device_stats WHERE device_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if stats > 0 {
            return Err(StorageError::HasDependents {
                entity: "device",
                id,
                dependents: "samples",
                count: stats,
            });
        }

        sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(device_id = id, "Deleted device");
        Ok(Some(device))
    }

    // ---- samples ----

    #[instrument(skip(self, stat))]
    pub async fn create_device_stat(&self, device_id: i64, stat: &NewDeviceStat) -> Result<DeviceStat> {
        let mut tx = self.pool.begin().await?;
        let stat = insert_stat(&mut tx, device_id, stat).await?;
        tx.commit().await?;
        Ok(stat)
    }

    /// Samples of a device inside `window`, oldest first
    #[instrument(skip(self))]
    pub async fn list_stats_for_device(
        &self,
        device_id: i64,
        window: TimeWindow,
    ) -> Result<Vec<DeviceStat>> {
        let Some((start_ns, end_ns)) = window.nanos_bounds() else {
            return Ok(Vec::new());
        };

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {STAT_COLUMNS} FROM device_stats WHERE device_id = "
        ));
        query.push_bind(device_id);
        if let Some(start) = start_ns {
            query.push(" AND timestamp_ns >= ").push_bind(start);
        }
        if let Some(end) = end_ns {
            query.push(" AND timestamp_ns <= ").push_bind(end);
        }
        query.push(" ORDER BY timestamp_ns, id");

        let stats = query
            .build_query_as::<DeviceStat>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = stats.len(), "Loaded samples");
        Ok(stats)
    }

    /// Remove every sample of a device and return what was removed
    #[instrument(skip(self))]
    pub async fn delete_device_stats(&self, device_id: i64) -> Result<Vec<DeviceStat>> {
        let mut stats = sqlx::query_as::<_, DeviceStat>(&format!(
            "DELETE FROM device_stats WHERE device_id = ? RETURNING {STAT_COLUMNS}"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        stats.sort_by_key(|s| (s.timestamp_ns, s.id));

        info!(device_id, count = stats.len(), "Deleted samples");
        Ok(stats)
    }

    // ---- counts ----

    pub async fn count_users(&self) -> Result<i64> {
        self.count("users").await
    }

    pub async fn count_devices(&self) -> Result<i64> {
        self.count("devices").await
    }

    pub async fn count_device_stats(&self) -> Result<i64> {
        self.count("device_stats").await
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            users: self.count_users().await?,
            devices: self.count_devices().await?,
            device_stats: self.count_device_stats().await?,
        })
    }

    async fn count(&self, table: &'static str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub(crate) async fn insert_user(conn: &mut SqliteConnection, username: &str) -> Result<User> {
    let username = normalize_name("username", username)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username) VALUES (?) RETURNING id, username",
    )
    .bind(username)
    .fetch_one(&mut *conn)
    .await?;
    Ok(user)
}

pub(crate) async fn insert_device(
    conn: &mut SqliteConnection,
    name: &str,
    user_id: i64,
) -> Result<Device> {
    let name = normalize_name("device name", name)?;

    let owners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if owners == 0 {
        return Err(StorageError::not_found("user", user_id));
    }

    let device = sqlx::query_as::<_, Device>(
        "INSERT INTO devices (name, user_id) VALUES (?, ?) RETURNING id, name, user_id",
    )
    .bind(name)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(device)
}

pub(crate) async fn insert_stat(
    conn: &mut SqliteConnection,
    device_id: i64,
    stat: &NewDeviceStat,
) -> Result<DeviceStat> {
    stat.validate()?;
    let timestamp_ns = stat.timestamp_ns()?;

    let devices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE id = ?")
        .bind(device_id)
        .fetch_one(&mut *conn)
        .await?;
    if devices == 0 {
        return Err(StorageError::not_found("device", device_id));
    }

    let row = sqlx::query_as::<_, DeviceStat>(&format!(
        "INSERT INTO device_stats (device_id, x, y, z, timestamp_ns) VALUES (?, ?, ?, ?, ?) RETURNING {STAT_COLUMNS}"
    ))
    .bind(device_id)
    .bind(stat.x)
    .bind(stat.y)
    .bind(stat.z)
    .bind(timestamp_ns)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    async fn repo_with_device() -> (Repository, User, Device) {
        let repo = Repository::in_memory().await.unwrap();
        let user = repo.create_user("alice").await.unwrap();
        let device = repo.create_device("wrist-01", user.id).await.unwrap();
        (repo, user, device)
    }

    #[tokio::test]
    async fn test_user_insert_and_retrieve() {
        let repo = Repository::in_memory().await.unwrap();

        let user = repo.create_user("  alice ").await.unwrap();
        assert_eq!(user.username, "alice");

        assert_eq!(repo.get_user(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            repo.get_user_by_username("alice").await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(repo.get_user_by_username("Alice").await.unwrap(), None);
        assert_eq!(repo.list_users().await.unwrap(), vec![user]);
        assert_eq!(repo.get_user(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = Repository::in_memory().await.unwrap();
        repo.create_user("alice").await.unwrap();

        let err = repo.create_user("alice").await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_blank_username_rejected() {
        let repo = Repository::in_memory().await.unwrap();
        let err = repo.create_user("   ").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = Repository::in_memory().await.unwrap();
        let user = repo.create_user("alice").await.unwrap();

        let renamed = repo.update_user(user.id, "alicia").await.unwrap().unwrap();
        assert_eq!(renamed.username, "alicia");
        assert_eq!(repo.update_user(42, "nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_device_requires_existing_owner() {
        let repo = Repository::in_memory().await.unwrap();
        let err = repo.create_device("orphan", 7).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "user", .. }));
        assert_eq!(repo.count_devices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_device_lookup_and_pagination() {
        let (repo, user, device) = repo_with_device().await;
        let second = repo.create_device("wrist-02", user.id).await.unwrap();
        let other = repo.create_user("bob").await.unwrap();
        let third = repo.create_device("ankle-01", other.id).await.unwrap();

        assert_eq!(repo.get_device(device.id).await.unwrap(), Some(device.clone()));
        assert_eq!(
            repo.get_device_by_name("wrist-02").await.unwrap(),
            Some(second.clone())
        );
        assert_eq!(
            repo.list_devices_for_user(user.id).await.unwrap(),
            vec![device.clone(), second.clone()]
        );
        assert_eq!(
            repo.list_devices(1, 10).await.unwrap(),
            vec![second.clone(), third.clone()]
        );
        assert_eq!(repo.list_devices(0, 1).await.unwrap(), vec![device.clone()]);
        assert_eq!(
            repo.get_device_for_user(other.id, device.id).await.unwrap(),
            None
        );
        assert_eq!(
            repo.get_device_for_user(user.id, device.id).await.unwrap(),
            Some(device)
        );
    }

    #[tokio::test]
    async fn test_stat_defaults_timestamp() {
        let (repo, _, device) = repo_with_device().await;
        let before = Utc::now();

        let stat = repo
            .create_device_stat(device.id, &NewDeviceStat::new(1.0, 2.0, 3.0))
            .await
            .unwrap();

        assert_eq!(stat.device_id, device.id);
        assert!(stat.timestamp() >= before);
    }

    #[tokio::test]
    async fn test_stat_for_missing_device() {
        let repo = Repository::in_memory().await.unwrap();
        let err = repo
            .create_device_stat(3, &NewDeviceStat::new(1.0, 2.0, 3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "device", .. }));
    }

    #[tokio::test]
    async fn test_window_is_inclusive() {
        let (repo, _, device) = repo_with_device().await;
        for ts in [100, 200, 300, 400] {
            repo.create_device_stat(device.id, &NewDeviceStat::new(ts as f64, 0.0, 0.0).at(at_ms(ts)))
                .await
                .unwrap();
        }

        let inside = repo
            .list_stats_for_device(device.id, TimeWindow::new(Some(at_ms(200)), Some(at_ms(300))))
            .await
            .unwrap();
        let readings: Vec<f64> = inside.iter().map(|s| s.x).collect();
        assert_eq!(readings, vec![200.0, 300.0]);

        let from = repo
            .list_stats_for_device(device.id, TimeWindow::new(Some(at_ms(300)), None))
            .await
            .unwrap();
        assert_eq!(from.len(), 2);

        let all = repo
            .list_stats_for_device(device.id, TimeWindow::unbounded())
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_window_bounds_keep_sub_millisecond_precision() {
        let (repo, _, device) = repo_with_device().await;
        let sampled: DateTime<Utc> = "2024-01-01T00:00:00.0001Z".parse().unwrap();
        repo.create_device_stat(device.id, &NewDeviceStat::new(1.0, 2.0, 3.0).at(sampled))
            .await
            .unwrap();

        let later: DateTime<Utc> = "2024-01-01T00:00:00.0005Z".parse().unwrap();
        let after = repo
            .list_stats_for_device(device.id, TimeWindow::new(Some(later), None))
            .await
            .unwrap();
        assert!(after.is_empty());

        let exact = repo
            .list_stats_for_device(device.id, TimeWindow::new(Some(sampled), Some(sampled)))
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].timestamp(), sampled);

        let beyond: DateTime<Utc> = "3000-01-01T00:00:00Z".parse().unwrap();
        let none = repo
            .list_stats_for_device(device.id, TimeWindow::new(Some(beyond), None))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_reading_not_stored() {
        let (repo, _, device) = repo_with_device().await;
        let err = repo
            .create_device_stat(device.id, &NewDeviceStat::new(1.7e308, 1.7e308, 1.7e308))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
        assert_eq!(repo.count_device_stats().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_refused_while_dependents_exist() {
        let (repo, user, device) = repo_with_device().await;
        repo.create_device_stat(device.id, &NewDeviceStat::new(1.0, 1.0, 1.0).at(at_ms(10)))
            .await
            .unwrap();

        let err = repo.delete_user(user.id).await.unwrap_err();
        assert!(matches!(err, StorageError::HasDependents { entity: "user", count: 1, .. }));

        let err = repo.delete_device(device.id).await.unwrap_err();
        assert!(matches!(err, StorageError::HasDependents { entity: "device", count: 1, .. }));

        let removed = repo.delete_device_stats(device.id).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(repo.delete_device(device.id).await.unwrap(), Some(device));
        assert_eq!(repo.delete_user(user.id).await.unwrap(), Some(user));
        assert!(repo.counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_returns_none() {
        let repo = Repository::in_memory().await.unwrap();
        assert_eq!(repo.delete_user(1).await.unwrap(), None);
        assert_eq!(repo.delete_device(1).await.unwrap(), None);
        assert!(repo.delete_device_stats(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts() {
        let (repo, _, device) = repo_with_device().await;
        repo.create_device_stat(device.id, &NewDeviceStat::new(0.0, 0.0, 0.0))
            .await
            .unwrap();

        let counts = repo.counts().await.unwrap();
        assert_eq!(
            counts,
            StoreCounts {
                users: 1,
                devices: 1,
                device_stats: 1
            }
        );
        assert!(!counts.is_empty());
    }
}
