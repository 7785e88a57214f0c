//! Command (pull): first line of a shell command's output
//!
//! The command runs through a [`PollCache`], so an expensive or flaky command
//! (`nvidia-smi`, a `curl` against a web API) runs at most once per TTL and a
//! failing run keeps showing the last good output.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::cache::{PollCache, PollSource};
use crate::fragment::{render_template, Fragment, FragmentStyle};
use crate::module::PullModule;

fn default_format() -> String {
    "{}".to_string()
}

fn default_ttl_secs() -> u64 {
    10
}

fn default_timeout_ms() -> u64 {
    2000
}

/// `type = "command"`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    /// Passed to `sh -c`
    pub command: String,
    /// Template, `{}` is replaced by the first output line
    #[serde(default = "default_format")]
    pub format: String,
    /// Seconds between runs
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Kill the command after this long
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Block name, also used in logs
    #[serde(default)]
    pub name: Option<String>,
    /// Block instance
    #[serde(default)]
    pub instance: Option<String>,
    /// Foreground color (`#rrggbb`)
    #[serde(default)]
    pub color: Option<String>,
}

/// Poll source running a shell command; there is no persistent connection
#[derive(Debug)]
pub struct CommandSource {
    command: String,
    timeout: Duration,
}

impl CommandSource {
    /// Source for `command`, killed after `timeout`
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PollSource for CommandSource {
    type Connection = ();
    type Value = String;

    fn name(&self) -> &str {
        &self.command
    }

    async fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch(&mut self, _connection: &mut ()) -> anyhow::Result<String> {
        let run = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .with_context(|| format!("'{}' timed out after {:?}", self.command, self.timeout))?
            .with_context(|| format!("failed to spawn '{}'", self.command))?;

        if !output.status.success() {
            anyhow::bail!("'{}' exited with {}", self.command, output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

/// Displays a command's output through a [`PollCache`]
#[derive(Debug)]
pub struct CommandModule {
    name: String,
    format: String,
    style: FragmentStyle,
    cache: PollCache<CommandSource>,
    output: Option<Fragment>,
}

impl CommandModule {
    /// Create from config
    #[must_use]
    pub fn new(config: CommandConfig) -> Self {
        let style = FragmentStyle {
            name: config.name,
            instance: config.instance,
            color: config.color,
        };
        Self {
            name: style.name.clone().unwrap_or_else(|| "command".to_string()),
            format: config.format,
            style,
            cache: PollCache::new(
                CommandSource::new(config.command, Duration::from_millis(config.timeout_ms)),
                Duration::from_secs(config.ttl_secs),
            ),
            output: None,
        }
    }
}

#[async_trait]
impl PullModule for CommandModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let value = self.cache.get_value().await;
        self.output = (!value.is_empty())
            .then(|| self.style.render(render_template(&self.format, &value)));
        Ok(())
    }

    fn last_output(&self) -> Option<Fragment> {
        self.output.clone()
    }
}
