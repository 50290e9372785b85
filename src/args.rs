//! These structs provide the CLI interface for the cadence CLI.

use crate::model::Period;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// cadence: Generates dated ledger entries from recurring rules and retainer contracts.
///
/// Income and expense rules repeat on a day of the month. Retainer contracts bill a monthly
/// amount, split into milestones, according to whichever contract version is in force. Each run
/// of `cadence generate` creates whatever is missing up to a short horizon ahead of today, and
/// never creates the same month twice.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory, its config file and the database.
    Init,
    /// Generate ledger entries for every active rule and contract.
    Generate(GenerateArgs),
    /// Add or update rules, contracts and contract versions from a JSON file.
    ///
    /// The file holds an object with optional `rules`, `contracts` and `versions` arrays.
    /// Existing rules and contracts with the same id are updated; existing versions are left
    /// unchanged because versions are never edited once they have been billed.
    Import(ImportArgs),
    /// Print stored records as JSON.
    List(ListArgs),
    /// Mark late income entries as overdue.
    MarkOverdue(MarkOverdueArgs),
    /// Push back the date an income entry is expected.
    Snooze(SnoozeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where cadence data and configuration is held. Defaults to ~/cadence
    #[arg(long, env = "CADENCE_HOME", default_value_t = default_cadence_home())]
    cadence_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, cadence_home: PathBuf) -> Self {
        Self {
            log_level,
            cadence_home: cadence_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn cadence_home(&self) -> &DisplayPath {
        &self.cadence_home
    }
}

/// Args for the `cadence generate` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct GenerateArgs {
    /// The date to generate as of, YYYY-MM-DD. Defaults to today's local date.
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// How many months, starting with the month of the as-of date, may be generated. Overrides
    /// the config file.
    #[arg(long)]
    horizon_months: Option<u32>,
}

impl GenerateArgs {
    pub fn new(as_of: Option<NaiveDate>, horizon_months: Option<u32>) -> Self {
        Self {
            as_of,
            horizon_months,
        }
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    pub fn horizon_months(&self) -> Option<u32> {
        self.horizon_months
    }
}

/// Args for the `cadence import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// Path to the JSON file to import.
    file: PathBuf,
}

impl ImportArgs {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// The kinds of records `cadence list` can print.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Rules,
    Contracts,
    Versions,
    #[default]
    Entries,
    Instances,
}

serde_plain::derive_display_from_serialize!(Entity);
serde_plain::derive_fromstr_from_deserialize!(Entity);

/// Args for the `cadence list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// What to list.
    entity: Entity,

    /// Limit entries or monthly instances to one billing month, YYYY-MM.
    #[arg(long)]
    month: Option<Period>,
}

impl ListArgs {
    pub fn new(entity: Entity, month: Option<Period>) -> Self {
        Self { entity, month }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn month(&self) -> Option<Period> {
        self.month
    }
}

/// Args for the `cadence mark-overdue` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct MarkOverdueArgs {
    /// The date to compare against, YYYY-MM-DD. Defaults to today's local date.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl MarkOverdueArgs {
    pub fn new(as_of: Option<NaiveDate>) -> Self {
        Self { as_of }
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }
}

/// Args for the `cadence snooze` command.
#[derive(Debug, Parser, Clone)]
pub struct SnoozeArgs {
    /// The id of the income entry, as printed by `cadence list entries`.
    entry_id: String,

    /// The date the money is now expected, YYYY-MM-DD.
    until: NaiveDate,
}

impl SnoozeArgs {
    pub fn new(entry_id: impl Into<String>, until: NaiveDate) -> Self {
        Self {
            entry_id: entry_id.into(),
            until,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn until(&self) -> NaiveDate {
        self.until
    }
}

fn default_cadence_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("cadence"),
        None => {
            error!(
                "Unable to determine your home directory. Provide --cadence-home or CADENCE_HOME \
                instead of relying on the default location.",
            );
            PathBuf::from("cadence")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
