//! Module Capability
//!
//! Every data source implements one of two traits:
//!
//! - [`PullModule`]: refreshed only when the engine ticks it, once per cycle.
//!   It owns its own `last_output`.
//! - [`PushModule`]: refreshes itself from its own task or thread in response
//!   to external events. Its output lives in a single-slot channel; the
//!   module holds the [`FragmentPublisher`] end and the registry samples the
//!   other end each cycle.
//!
//! The push/pull split is the [`Module`] enum, so the registry never has to
//! ask a module which kind it is.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::fragment::Fragment;

/// Position of a module in the registry (registration order)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    /// Zero-based registration index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Scheduling kind of a module
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Refreshed by the engine's tick
    Pull,
    /// Refreshes itself asynchronously
    Push,
}

impl ModuleKind {
    /// Whether the module self-reports
    #[must_use]
    pub fn is_push(self) -> bool {
        matches!(self, Self::Push)
    }
}

/// A module refreshed synchronously by the engine
#[async_trait]
pub trait PullModule: Send {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Called once, synchronously, when the module is registered
    fn on_register(&mut self, _slot: SlotId) {}

    /// Refresh `last_output`
    ///
    /// Must not block beyond the module's own internal timeout; the engine
    /// awaits every pull module in sequence.
    async fn tick(&mut self) -> anyhow::Result<()>;

    /// The fragment to display, or `None` to be omitted from the bar
    fn last_output(&self) -> Option<Fragment>;
}

/// A module that refreshes itself outside the tick cycle
pub trait PushModule: Send {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Called once, synchronously, when the module is registered
    ///
    /// The module takes ownership of itself and the publisher and is
    /// expected to start its event loop here (usually `tokio::spawn`).
    /// Registration happens inside the engine's runtime.
    fn on_register(self: Box<Self>, publisher: FragmentPublisher);
}

/// A registrable module: the tagged push/pull variant
pub enum Module {
    /// Ticked by the engine
    Pull(Box<dyn PullModule>),
    /// Publishes on its own schedule
    Push(Box<dyn PushModule>),
}

impl Module {
    /// Wrap a pull module
    pub fn pull(module: impl PullModule + 'static) -> Self {
        Self::Pull(Box::new(module))
    }

    /// Wrap a push module
    pub fn push(module: impl PushModule + 'static) -> Self {
        Self::Push(Box::new(module))
    }

    /// Module name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pull(m) => m.name(),
            Self::Push(m) => m.name(),
        }
    }

    /// Scheduling kind
    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::Pull(_) => ModuleKind::Pull,
            Self::Push(_) => ModuleKind::Push,
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Sending half of a push module's output slot
///
/// Each publish replaces the previous value atomically; only the latest
/// value is ever observed by the engine.
#[derive(Debug, Clone)]
pub struct FragmentPublisher {
    tx: watch::Sender<Option<Fragment>>,
}

impl FragmentPublisher {
    pub(crate) fn channel() -> (Self, watch::Receiver<Option<Fragment>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Replace the displayed fragment
    pub fn publish(&self, fragment: Fragment) {
        self.tx.send_replace(Some(fragment));
    }

    /// Show nothing until the next publish
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Whether the registry side has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
