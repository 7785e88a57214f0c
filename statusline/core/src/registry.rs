//! Module Registry
//!
//! Owns the ordered set of modules and mediates ticking. Registration order
//! is display order; membership is append-only for the life of the run.
//!
//! # Failure handling
//!
//! How a failing `tick` is treated depends on [`FailurePolicy`]:
//!
//! - `Isolate`: the error (or panic) is logged and the module is left out
//!   of this cycle's snapshot. The other modules are unaffected.
//! - `Strict`: the first error is returned and the caller is expected to
//!   terminate. Panics propagate.
//!
//! A tick that exceeds `TickOptions::tick_timeout` is cancelled and treated
//! as a refresh failure: the module keeps whatever output it had.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::ModuleError;
use crate::fragment::Fragment;
use crate::module::{FragmentPublisher, Module, ModuleKind, PullModule, SlotId};

/// What to do when a pull module's `tick` fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log, drop the module's fragment for the cycle, keep running
    #[default]
    Isolate,
    /// Propagate the first failure and stop
    Strict,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "isolate" => Ok(Self::Isolate),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown failure policy '{other}' (expected 'isolate' or 'strict')"
            )),
        }
    }
}

/// Options for one `tick_all` pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOptions {
    /// Failure handling
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single module's tick (`None` = unbounded)
    pub tick_timeout: Option<Duration>,
}

/// Outcome counts for one `tick_all` pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pull modules ticked
    pub ticked: usize,
    /// Modules whose tick failed or panicked (isolated)
    pub failed: usize,
    /// Modules whose tick was cancelled by the timeout
    pub timed_out: usize,
}

enum SlotState {
    Pull {
        module: Box<dyn PullModule>,
        /// Set when the last tick failed under `Isolate`
        failed: bool,
    },
    Push {
        rx: watch::Receiver<Option<Fragment>>,
    },
}

struct Slot {
    name: String,
    state: SlotState,
}

impl Slot {
    fn kind(&self) -> ModuleKind {
        match self.state {
            SlotState::Pull { .. } => ModuleKind::Pull,
            SlotState::Push { .. } => ModuleKind::Push,
        }
    }

    fn sample(&self) -> Option<Fragment> {
        match &self.state {
            SlotState::Pull { failed: true, .. } => None,
            SlotState::Pull { module, .. } => module.last_output(),
            SlotState::Push { rx } => rx.borrow().clone(),
        }
    }
}

/// Ordered, append-only set of modules
#[derive(Default)]
pub struct ModuleRegistry {
    slots: Vec<Slot>,
}

impl ModuleRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module and run its registration hook
    ///
    /// Push modules receive their publisher here and usually spawn their
    /// event loop, so this must be called from within a tokio runtime when
    /// push modules are involved. Registering the same source twice yields
    /// two independent slots.
    pub fn register(&mut self, module: Module) -> SlotId {
        let id = SlotId(self.slots.len());
        let name = module.name().to_string();
        let kind = module.kind();

        let state = match module {
            Module::Pull(mut module) => {
                module.on_register(id);
                SlotState::Pull {
                    module,
                    failed: false,
                }
            }
            Module::Push(module) => {
                let (publisher, rx) = FragmentPublisher::channel();
                module.on_register(publisher);
                SlotState::Push { rx }
            }
        };

        info!(slot = %id, module = %name, kind = ?kind, "Module registered");
        self.slots.push(Slot { name, state });
        id
    }

    /// Number of registered modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no modules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Module names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Module kinds in registration order
    #[must_use]
    pub fn kinds(&self) -> Vec<ModuleKind> {
        self.slots.iter().map(Slot::kind).collect()
    }

    /// Tick every pull module once, in registration order
    ///
    /// Push modules are never ticked.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Strict`], returns the first module error.
    /// Modules after the failing one are not ticked.
    pub async fn tick_all(&mut self, options: &TickOptions) -> Result<TickReport, ModuleError> {
        let mut report = TickReport::default();

        for slot in &mut self.slots {
            let SlotState::Pull { module, failed } = &mut slot.state else {
                continue;
            };
            *failed = false;
            report.ticked += 1;

            match tick_one(module.as_mut(), &slot.name, options).await {
                Some(Ok(())) => {}
                None => {
                    report.timed_out += 1;
                    warn!(
                        module = %slot.name,
                        timeout = ?options.tick_timeout,
                        "Module tick timed out, keeping previous output"
                    );
                }
                Some(Err(err)) => match options.failure_policy {
                    FailurePolicy::Strict => return Err(err),
                    FailurePolicy::Isolate => {
                        report.failed += 1;
                        *failed = true;
                        error!(module = %slot.name, error = %err, "Module tick failed");
                    }
                },
            }
        }

        debug!(
            ticked = report.ticked,
            failed = report.failed,
            timed_out = report.timed_out,
            "Tick pass complete"
        );
        Ok(report)
    }

    /// Current output of every module, in registration order
    ///
    /// Push modules are sampled without blocking; a module whose tick failed
    /// this cycle contributes `None`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Option<Fragment>> {
        self.slots.iter().map(Slot::sample).collect()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

/// Tick one module. `None` means the timeout elapsed.
async fn tick_one(
    module: &mut dyn PullModule,
    name: &str,
    options: &TickOptions,
) -> Option<Result<(), ModuleError>> {
    let tick = module.tick();

    match options.failure_policy {
        FailurePolicy::Strict => bounded(tick, options.tick_timeout)
            .await
            .map(|result| {
                result.map_err(|source| ModuleError::Failed {
                    module: name.to_string(),
                    source,
                })
            }),
        FailurePolicy::Isolate => bounded(AssertUnwindSafe(tick).catch_unwind(), options.tick_timeout)
            .await
            .map(|result| match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(ModuleError::Failed {
                    module: name.to_string(),
                    source,
                }),
                Err(payload) => Err(ModuleError::Panicked {
                    module: name.to_string(),
                    message: panic_message(payload.as_ref()),
                }),
            }),
    }
}

async fn bounded<F: Future>(fut: F, timeout: Option<Duration>) -> Option<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
