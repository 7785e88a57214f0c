//! Protocol Engine
//!
//! Owns the run loop between an upstream status generator (or the host
//! itself) and the status-bar host:
//!
//! 1. Handshake: read exactly two lines (version header and array opener),
//!    forwarding them unless configured not to. An empty line here also
//!    ends the run.
//! 2. Steady state, once per input line:
//!    - empty line or end-of-stream ⇒ [`EngineError::InputClosed`]
//!    - strip the continuation marker
//!    - tick every pull module once, in registration order
//!    - sample every module, aggregate, serialize
//!    - write `<prefix><array>\n` and flush
//!
//! The engine only ever blocks on reading input and on whatever a pull
//! module does inside its own tick. Without a `tick_timeout`, a slow pull
//! module stalls the whole cycle.

use std::convert::Infallible;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::aggregator::{OrderPolicy, OutputAggregator};
use crate::error::EngineError;
use crate::registry::{FailurePolicy, ModuleRegistry, TickOptions};

use super::line::{encode_line, InputLine};

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Placement of module blocks in the output array
    pub order: OrderPolicy,
    /// Handling of module tick failures
    pub failure_policy: FailurePolicy,
    /// Per-module tick bound (`None` = unbounded)
    pub tick_timeout: Option<Duration>,
    /// Copy the two preamble lines to output
    pub forward_preamble: bool,
    /// Carry through blocks found in the input line
    pub merge_upstream: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order: OrderPolicy::Prepend,
            failure_policy: FailurePolicy::Isolate,
            tick_timeout: None,
            forward_preamble: true,
            merge_upstream: true,
        }
    }
}

impl EngineConfig {
    /// Bit-for-bit legacy behaviour: prepend order, strict failures, no timeout
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            failure_policy: FailurePolicy::Strict,
            ..Self::default()
        }
    }

    fn tick_options(&self) -> TickOptions {
        TickOptions {
            failure_policy: self.failure_policy,
            tick_timeout: self.tick_timeout,
        }
    }
}

/// The protocol run loop
pub struct ProtocolEngine<R, W> {
    reader: R,
    writer: W,
    registry: ModuleRegistry,
    aggregator: OutputAggregator,
    config: EngineConfig,
    line: String,
    cycles: u64,
}

impl<R, W> ProtocolEngine<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create an engine over the given input and output
    pub fn new(reader: R, writer: W, registry: ModuleRegistry, config: EngineConfig) -> Self {
        Self {
            reader,
            writer,
            registry,
            aggregator: OutputAggregator::new(config.order),
            config,
            line: String::new(),
            cycles: 0,
        }
    }

    /// The module registry
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Completed steady-state cycles
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Give back the input and output
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Run the handshake, then cycle until input closes or an error occurs
    ///
    /// # Errors
    ///
    /// Always returns an error: [`EngineError::InputClosed`] on the host's
    /// shutdown signal, anything else on failure.
    pub async fn run(&mut self) -> Result<Infallible, EngineError> {
        info!(
            modules = self.registry.len(),
            order = ?self.aggregator.order(),
            failure_policy = ?self.config.failure_policy,
            tick_timeout = ?self.config.tick_timeout,
            "Protocol engine starting"
        );
        self.handshake().await?;
        loop {
            self.cycle().await?;
        }
    }

    /// Consume the two-line preamble
    ///
    /// The lines are not interpreted, except that an empty line is the
    /// termination signal here as well.
    ///
    /// # Errors
    ///
    /// [`EngineError::InputClosed`] if input ends or delivers an empty line
    /// before both lines arrive.
    pub async fn handshake(&mut self) -> Result<(), EngineError> {
        for _ in 0..2 {
            self.read_line().await?;
            if self.line.trim().is_empty() {
                info!("Empty preamble line, input closed");
                return Err(EngineError::InputClosed);
            }
            if self.config.forward_preamble {
                if !self.line.ends_with('\n') {
                    self.line.push('\n');
                }
                self.writer.write_all(self.line.as_bytes()).await?;
            }
        }
        self.writer.flush().await?;
        debug!(forwarded = self.config.forward_preamble, "Preamble consumed");
        Ok(())
    }

    /// Run one steady-state cycle
    ///
    /// # Errors
    ///
    /// [`EngineError::InputClosed`] on an empty line or end-of-stream,
    /// [`EngineError::ModuleFatal`] under strict failure handling, I/O and
    /// serialization errors otherwise. Nothing is written on error.
    pub async fn cycle(&mut self) -> Result<(), EngineError> {
        self.read_line().await?;

        let (continuation, upstream) = {
            let input = InputLine::decode(&self.line).ok_or(EngineError::InputClosed)?;
            let upstream = if self.config.merge_upstream {
                input.upstream_blocks()
            } else {
                Vec::new()
            };
            (input.continuation, upstream)
        };

        let report = self.registry.tick_all(&self.config.tick_options()).await?;
        let blocks = self
            .aggregator
            .aggregate(self.registry.snapshot(), upstream);
        let output = encode_line(continuation, &blocks)?;

        self.writer.write_all(output.as_bytes()).await?;
        self.writer.flush().await?;

        self.cycles += 1;
        debug!(
            cycle = self.cycles,
            blocks = blocks.len(),
            failed = report.failed,
            timed_out = report.timed_out,
            "Cycle written"
        );
        Ok(())
    }

    async fn read_line(&mut self) -> Result<(), EngineError> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            info!("Input reached end of stream");
            return Err(EngineError::InputClosed);
        }
        Ok(())
    }
}

impl<R, W> std::fmt::Debug for ProtocolEngine<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}
