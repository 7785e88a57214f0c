//! Statusline Core - i3bar status-line aggregation
//!
//! Sits in a pipeline between a status generator (or the bar host directly)
//! and an i3bar-protocol host. Every input line triggers one cycle: pull
//! modules are ticked, every module is sampled, and one JSON array of blocks
//! is written back out.
//!
//! # Architecture
//!
//! ```text
//!   upstream (i3status, another statusline, or the host)
//!        │  {"version":1}
//!        │  [
//!        │  [{...}] / ,[{...}] / ...
//!        ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ProtocolEngine                           │
//! │   handshake ─► read line ─► tick_all ─► snapshot ─► aggregate │
//! │                                │           │           │      │
//! │                 ┌──────────────┴───────────┴──┐        │      │
//! │                 │       ModuleRegistry         │        │      │
//! │                 │  ┌────────┐   ┌───────────┐  │        │      │
//! │                 │  │  Pull  │   │   Push    │  │        │      │
//! │                 │  │ tick() │   │ watch rx  │◄─┼── background tasks
//! │                 │  └───┬────┘   └───────────┘  │        │      │
//! │                 └──────┼───────────────────────┘        │      │
//! │                        ▼                                │      │
//! │                   PollCache (TTL, lazy reconnect)       │      │
//! └─────────────────────────────────────────────────────────┼──────┘
//!        ▼                                                  │
//!   host  ◄─────────────── ,[{"full_text":...},...] ◄───────┘
//! ```
//!
//! # Key Types
//!
//! - [`ProtocolEngine`]: handshake and the per-line cycle
//! - [`ModuleRegistry`]: ordered module slots, ticking and sampling
//! - [`PullModule`] / [`PushModule`]: the two module capabilities
//! - [`PollCache`]: TTL cache with lazy reconnect for pull modules
//! - [`OutputAggregator`]: turns a snapshot into an ordered block list
//!
//! # Quick Start
//!
//! ```ignore
//! use statusline_core::{EngineConfig, ModuleRegistry, ProtocolEngine};
//! use statusline_core::modules::{ClockConfig, ModuleConfig};
//! use tokio::io::BufReader;
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register(ModuleConfig::Clock(ClockConfig::default()).build());
//!
//! let mut engine = ProtocolEngine::new(
//!     BufReader::new(tokio::io::stdin()),
//!     tokio::io::stdout(),
//!     registry,
//!     EngineConfig::default(),
//! );
//! let err = engine.run().await.unwrap_err();
//! std::process::exit(err.exit_code());
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fragment;
pub mod module;
pub mod modules;
pub mod protocol;
pub mod registry;

pub use aggregator::{Block, OrderPolicy, OutputAggregator};
pub use cache::{CacheError, CacheStats, PollCache, PollSource};
pub use error::{EngineError, ModuleError, EXIT_FAILURE, EXIT_INPUT_CLOSED};
pub use fragment::{Fragment, FragmentStyle};
pub use module::{FragmentPublisher, Module, ModuleKind, PullModule, PushModule, SlotId};
pub use protocol::{EngineConfig, ProtocolEngine, CONTINUATION_MARKER};
pub use registry::{FailurePolicy, ModuleRegistry, TickOptions, TickReport};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, StatusConfig,
};
