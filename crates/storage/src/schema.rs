//! SQLite schema

pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE
)
"#;

pub const CREATE_DEVICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    user_id INTEGER NOT NULL REFERENCES users(id)
)
"#;

pub const CREATE_DEVICE_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS device_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL REFERENCES devices(id),
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL,
    timestamp_ns INTEGER NOT NULL
)
"#;

pub const CREATE_INDEX_DEVICES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_devices_user_id ON devices(user_id)";

pub const CREATE_INDEX_STATS_DEVICE_TS: &str =
    "CREATE INDEX IF NOT EXISTS idx_device_stats_device_ts ON device_stats(device_id, timestamp_ns)";

/// Statements run in order by `Repository::migrate`
pub const ALL: [&str; 5] = [
    CREATE_USERS_TABLE,
    CREATE_DEVICES_TABLE,
    CREATE_DEVICE_STATS_TABLE,
    CREATE_INDEX_DEVICES_USER,
    CREATE_INDEX_STATS_DEVICE_TS,
];
