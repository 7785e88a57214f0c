//! Built-in Modules
//!
//! Thin data-source adapters. None of them carry coordination logic; they
//! only implement [`PullModule`](crate::module::PullModule) or
//! [`PushModule`](crate::module::PushModule).
//!
//! - `clock` (pull): local time
//! - `file` (pull): contents of a small file, through a poll cache
//! - `command` (pull): first line of a shell command, through a poll cache
//! - `fifo` (push, Linux): lines written to a named pipe

pub mod clock;
pub mod command;
#[cfg(target_os = "linux")]
pub mod fifo;
pub mod file;

use serde::Deserialize;

use crate::module::Module;

pub use clock::{ClockConfig, ClockModule};
pub use command::{CommandConfig, CommandModule, CommandSource};
#[cfg(target_os = "linux")]
pub use fifo::{FifoConfig, FifoModule};
pub use file::{FileConfig, FileModule, FileSource};

/// One `[[module]]` table from the config file
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModuleConfig {
    /// Local time
    Clock(ClockConfig),
    /// File contents
    File(FileConfig),
    /// Shell command output
    Command(CommandConfig),
    /// Named pipe
    #[cfg(target_os = "linux")]
    Fifo(FifoConfig),
}

impl ModuleConfig {
    /// Module type as written in the config
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Clock(_) => "clock",
            Self::File(_) => "file",
            Self::Command(_) => "command",
            #[cfg(target_os = "linux")]
            Self::Fifo(_) => "fifo",
        }
    }

    /// Check for values that can never work
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Clock(c) if c.format.is_empty() => Err("clock format is empty".to_string()),
            Self::File(c) if c.path.as_os_str().is_empty() => Err("file path is empty".to_string()),
            Self::Command(c) if c.command.trim().is_empty() => {
                Err("command is empty".to_string())
            }
            Self::Command(c) if c.timeout_ms == 0 => {
                Err("command timeout_ms must be greater than zero".to_string())
            }
            #[cfg(target_os = "linux")]
            Self::Fifo(c) if c.path.as_os_str().is_empty() => {
                Err("fifo path is empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Construct the module
    #[must_use]
    pub fn build(self) -> Module {
        match self {
            Self::Clock(c) => Module::pull(ClockModule::new(c)),
            Self::File(c) => Module::pull(FileModule::new(c)),
            Self::Command(c) => Module::pull(CommandModule::new(c)),
            #[cfg(target_os = "linux")]
            Self::Fifo(c) => Module::push(FifoModule::new(c)),
        }
    }
}
