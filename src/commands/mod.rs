//! Command handlers for the cadence CLI.
//!
//! Each handler returns an `Out<T>` holding a message for the user and, optionally, structured
//! data that is printed as JSON.

mod generate;
mod import;
mod init;
mod list;
mod overdue;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use generate::generate;
pub use import::import;
pub use init::init;
pub use list::{list, Listing};
pub use overdue::{mark_overdue, snooze, OverdueSweep};

/// The output of a command: a message that can be printed to the user regarding the outcome of
/// the command, and any structured data that goes with it.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    message: String,
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to stdout, so
    /// that it can be piped to other tools.
    pub fn print_json(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            match serde_json::to_string_pretty(structure) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("Unable to serialize the command output: {e}"),
            }
        }
    }
}
