//! File (pull): shows the contents of a small file
//!
//! Meant for sysfs/procfs style values (`/sys/class/backlight/*/brightness`,
//! `/sys/class/thermal/thermal_zone0/temp`). The open file handle is the
//! cache's connection: it is rewound and re-read on every refresh, and
//! reopened after any read failure (device hot-unplug, file replaced).

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::cache::{PollCache, PollSource};
use crate::fragment::{render_template, Fragment, FragmentStyle};
use crate::module::PullModule;

fn default_format() -> String {
    "{}".to_string()
}

fn default_ttl_secs() -> u64 {
    5
}

/// `type = "file"`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// File to read
    pub path: PathBuf,
    /// Template, `{}` is replaced by the trimmed contents
    #[serde(default = "default_format")]
    pub format: String,
    /// Seconds between re-reads
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
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

/// Poll source reading a whole file through a kept-open handle
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    label: String,
}

impl FileSource {
    /// Source for `path`
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let label = path.display().to_string();
        Self { path, label }
    }
}

#[async_trait]
impl PollSource for FileSource {
    type Connection = File;
    type Value = String;

    fn name(&self) -> &str {
        &self.label
    }

    async fn connect(&mut self) -> anyhow::Result<File> {
        File::open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))
    }

    async fn fetch(&mut self, file: &mut File) -> anyhow::Result<String> {
        file.seek(SeekFrom::Start(0)).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        Ok(contents.trim().to_string())
    }
}

/// Displays a file's contents through a [`PollCache`]
#[derive(Debug)]
pub struct FileModule {
    name: String,
    format: String,
    style: FragmentStyle,
    cache: PollCache<FileSource>,
    output: Option<Fragment>,
}

impl FileModule {
    /// Create from config
    #[must_use]
    pub fn new(config: FileConfig) -> Self {
        let style = FragmentStyle {
            name: config.name,
            instance: config.instance,
            color: config.color,
        };
        let name = style.name.clone().unwrap_or_else(|| {
            config
                .path
                .file_name()
                .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned())
        });
        Self {
            name,
            format: config.format,
            style,
            cache: PollCache::new(
                FileSource::new(config.path),
                Duration::from_secs(config.ttl_secs),
            ),
            output: None,
        }
    }
}

#[async_trait]
impl PullModule for FileModule {
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
