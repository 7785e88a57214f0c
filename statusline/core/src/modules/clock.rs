//! Clock (pull): local time formatted with a strftime pattern

use std::fmt::Write;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;

use crate::fragment::{Fragment, FragmentStyle};
use crate::module::PullModule;

fn default_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

/// `type = "clock"`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// strftime pattern
    #[serde(default = "default_format")]
    pub format: String,
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

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            name: None,
            instance: None,
            color: None,
        }
    }
}

/// Shows the current local time
#[derive(Debug)]
pub struct ClockModule {
    name: String,
    format: String,
    style: FragmentStyle,
    output: Option<Fragment>,
}

impl ClockModule {
    /// Create from config
    #[must_use]
    pub fn new(config: ClockConfig) -> Self {
        let style = FragmentStyle {
            name: config.name,
            instance: config.instance,
            color: config.color,
        };
        Self {
            name: style.name.clone().unwrap_or_else(|| "clock".to_string()),
            format: config.format,
            style,
            output: None,
        }
    }

    fn render<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> anyhow::Result<String>
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut text = String::new();
        write!(text, "{}", at.format(&self.format))
            .map_err(|_| anyhow::anyhow!("invalid clock format '{}'", self.format))?;
        Ok(text)
    }
}

#[async_trait]
impl PullModule for ClockModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let text = self.render(&Local::now())?;
        self.output = Some(self.style.render(text));
        Ok(())
    }

    fn last_output(&self) -> Option<Fragment> {
        self.output.clone()
    }
}
