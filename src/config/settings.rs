//! Persistence configuration settings and environment variable handling

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

// Connection defaults
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_NAME: &str = "option_monitor";
pub const DEFAULT_DB_USER: &str = "option_user";
pub const DEFAULT_DB_CHARSET: &str = "utf8mb4";
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 300; // 5 minutes

// Monitor defaults
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

// Secondary store defaults
pub const DEFAULT_CSV_PATH: &str = "data/option_trades.csv";

/// Connection parameters for the primary store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub autocommit: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Idle time after which `ensure_live` re-verifies the connection.
    pub ping_interval: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            charset: DEFAULT_DB_CHARSET.to_string(),
            autocommit: true,
            connect_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
        }
    }
}

/// Which sinks receive trade records, and where the CSV file lives.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub save_to_db: bool,
    pub save_to_csv: bool,
    pub csv_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_to_db: true,
            save_to_csv: true,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    /// Upper bound on how long `stop()` waits for the loop to exit.
    pub stop_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub persistence: PersistenceConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let env = EnvSource { lookup: &lookup };

        Self {
            database: DatabaseConfig {
                host: env.string("DB_HOST").unwrap_or(defaults.database.host),
                port: env.parsed("DB_PORT").unwrap_or(defaults.database.port),
                user: env.string("DB_USER").unwrap_or(defaults.database.user),
                password: env.string("DB_PASSWORD").unwrap_or(defaults.database.password),
                database: env.string("DB_NAME").unwrap_or(defaults.database.database),
                charset: env.string("DB_CHARSET").unwrap_or(defaults.database.charset),
                autocommit: env.parsed("DB_AUTOCOMMIT").unwrap_or(defaults.database.autocommit),
                connect_timeout: env
                    .secs("DB_CONNECT_TIMEOUT_SECS")
                    .unwrap_or(defaults.database.connect_timeout),
                read_timeout: env
                    .secs("DB_READ_TIMEOUT_SECS")
                    .unwrap_or(defaults.database.read_timeout),
                write_timeout: env
                    .secs("DB_WRITE_TIMEOUT_SECS")
                    .unwrap_or(defaults.database.write_timeout),
                ping_interval: env
                    .secs("DB_PING_INTERVAL_SECS")
                    .unwrap_or(defaults.database.ping_interval),
            },
            persistence: PersistenceConfig {
                save_to_db: env.parsed("SAVE_TO_DB").unwrap_or(defaults.persistence.save_to_db),
                save_to_csv: env.parsed("SAVE_TO_CSV").unwrap_or(defaults.persistence.save_to_csv),
                csv_path: env
                    .string("CSV_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.persistence.csv_path),
            },
            monitor: MonitorConfig {
                check_interval: env
                    .secs("HEALTH_CHECK_INTERVAL_SECS")
                    .unwrap_or(defaults.monitor.check_interval),
                stop_timeout: env
                    .secs("MONITOR_STOP_TIMEOUT_SECS")
                    .unwrap_or(defaults.monitor.stop_timeout),
            },
        }
    }
}

struct EnvSource<'a, F> {
    lookup: &'a F,
}

impl<F> EnvSource<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    // Empty values count as unset.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable environment override");
                None
            }
        }
    }

    fn secs(&self, key: &str) -> Option<Duration> {
        self.parsed::<u64>(key).map(Duration::from_secs)
    }
}
