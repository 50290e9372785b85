//! Configuration file handling.
//!
//! The configuration file is stored at `$CADENCE_HOME/config.json`. It holds the generation
//! settings and, optionally, a non-default location for the SQLite database.

use crate::db::Db;
use crate::engine::{DEFAULT_HORIZON_MONTHS, MAX_HORIZON_MONTHS};
use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "cadence";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const CADENCE_SQLITE: &str = "cadence.sqlite";
const OVERDUE_GRACE_DAYS: u32 = 7;

/// The configuration of the app. You instantiate it by providing the path to `$CADENCE_HOME` and
/// from there it loads `$CADENCE_HOME/config.json` and opens the database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    sqlite_path: PathBuf,
    db: Db,
}

impl Config {
    /// Creates the home directory, writes a default `config.json` and initializes the database.
    ///
    /// # Errors
    /// - Returns an `ErrorType::Config` error if a config file already exists in `dir`, or if any
    ///   file or database operation fails.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::create_home(dir.into())
            .await
            .pub_result(ErrorType::Config)
    }

    /// - Validates that `cadence_home` and its config file exist
    /// - Loads and validates the config file
    /// - Opens the database, migrating it if needed
    pub async fn load(cadence_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_home(cadence_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_home(maybe_relative: PathBuf) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the cadence home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        ensure!(
            !config_path.exists(),
            "A config file already exists at {}",
            config_path.display()
        );
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        let sqlite_path = config_file.sqlite_path(&root);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create the SQLite database")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            sqlite_path,
            db,
        })
    }

    async fn load_home(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The cadence home directory is missing, run 'cadence init' first")?;

        let config_path = root.join(CONFIG_JSON);
        ensure!(
            config_path.is_file(),
            "The config file is missing '{}'",
            config_path.display()
        );
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = config_file.sqlite_path(&root);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load the SQLite database")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            sqlite_path,
            db,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// How many months, starting with the current one, a generation run may produce.
    pub fn horizon_months(&self) -> u32 {
        self.config_file.horizon_months
    }

    /// How many days past its effective date an income entry may be before it is overdue.
    pub fn overdue_grace_days(&self) -> u32 {
        self.config_file.overdue_grace_days
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cadence",
///   "config_version": 1,
///   "horizon_months": 2,
///   "overdue_grace_days": 7,
///   "sqlite_path": "data/cadence.sqlite"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "cadence"
    app_name: String,

    config_version: u8,

    #[serde(default = "default_horizon_months")]
    horizon_months: u32,

    #[serde(default = "default_overdue_grace_days")]
    overdue_grace_days: u32,

    /// Location of the database, relative to the home directory or absolute. Defaults to
    /// `$CADENCE_HOME/cadence.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sqlite_path: Option<PathBuf>,
}

fn default_horizon_months() -> u32 {
    DEFAULT_HORIZON_MONTHS
}

fn default_overdue_grace_days() -> u32 {
    OVERDUE_GRACE_DAYS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            horizon_months: DEFAULT_HORIZON_MONTHS,
            overdue_grace_days: OVERDUE_GRACE_DAYS,
            sqlite_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads and validates a config file.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{APP_NAME}', got '{}'",
            config.app_name
        );
        ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is newer than this program supports ({CONFIG_VERSION})",
            config.config_version
        );
        ensure!(
            (1..=MAX_HORIZON_MONTHS).contains(&config.horizon_months),
            "horizon_months must be between 1 and {MAX_HORIZON_MONTHS}, got {}",
            config.horizon_months
        );
        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    /// Resolves the database path against `root` when it is relative.
    fn sqlite_path(&self, root: &Path) -> PathBuf {
        match &self.sqlite_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(CADENCE_SQLITE),
        }
    }
}
