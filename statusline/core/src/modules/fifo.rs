//! FIFO (push): displays whatever is written to a named pipe
//!
//! External scripts push updates with `echo "text" > $FIFO`. Each non-empty
//! line replaces the fragment; an empty line clears it. Invalid UTF-8 is
//! decoded lossily. The pipe is opened read-write so the reader never sees
//! end-of-file when writers come and go. The pipe must already exist
//! (`mkfifo`).

use std::path::PathBuf;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tracing::{debug, error, info, warn};

use crate::fragment::{render_template, FragmentStyle};
use crate::module::{FragmentPublisher, PushModule};

fn default_format() -> String {
    "{}".to_string()
}

/// `type = "fifo"`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FifoConfig {
    /// Named pipe to read
    pub path: PathBuf,
    /// Template, `{}` is replaced by the received line
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

/// Push module fed by a named pipe
#[derive(Debug)]
pub struct FifoModule {
    name: String,
    path: PathBuf,
    format: String,
    style: FragmentStyle,
}

impl FifoModule {
    /// Create from config
    #[must_use]
    pub fn new(config: FifoConfig) -> Self {
        let style = FragmentStyle {
            name: config.name,
            instance: config.instance,
            color: config.color,
        };
        Self {
            name: style.name.clone().unwrap_or_else(|| "fifo".to_string()),
            path: config.path,
            format: config.format,
            style,
        }
    }

    async fn run(self, publisher: FragmentPublisher) {
        let receiver = match pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&self.path)
        {
            Ok(receiver) => receiver,
            Err(e) => {
                error!(module = %self.name, path = ?self.path, error = %e, "Failed to open FIFO");
                return;
            }
        };
        info!(module = %self.name, path = ?self.path, "Listening on FIFO");

        let mut reader = BufReader::new(receiver);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if publisher.is_closed() {
                        break;
                    }
                    // Undecodable bytes become U+FFFD
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim();
                    if line.is_empty() {
                        publisher.clear();
                    } else {
                        publisher.publish(self.style.render(render_template(&self.format, line)));
                    }
                    debug!(module = %self.name, "FIFO update published");
                }
                Err(e) => {
                    warn!(module = %self.name, error = %e, "FIFO read failed");
                    break;
                }
            }
        }
        info!(module = %self.name, "FIFO listener stopped");
    }
}

impl PushModule for FifoModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_register(self: Box<Self>, publisher: FragmentPublisher) {
        tokio::spawn(self.run(publisher));
    }
}
