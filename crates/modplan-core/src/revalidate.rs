//! Debounced, single-flight background re-evaluation of a plan.
//!
//! Every [`RevalidatorHandle::submit`] bumps a version counter and replaces
//! the pending snapshot. The worker waits until no submission has arrived
//! for the quiet window, evaluates the latest snapshot on the blocking pool,
//! and publishes the result only if no newer submission arrived meanwhile.
//! Stale results are dropped, never retried: the newer submission triggers
//! its own run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::evaluate::{Evaluation, evaluate};
use crate::plan::{CurrentSemester, Plan};
use crate::requirements::RequirementCategory;

/// Default quiet window before a submission is evaluated.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(800);

#[derive(Debug, thiserror::Error)]
pub enum RevalidateError {
    #[error("revalidator has stopped")]
    Stopped,
}

#[derive(Debug, Clone)]
pub struct RevalidatorConfig {
    /// A submission is evaluated once this long passes without another one.
    pub quiet_window: Duration,
}

impl Default for RevalidatorConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

/// An evaluation published for a given plan version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub version: u64,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone)]
struct Snapshot {
    version: u64,
    plan: Arc<Plan>,
    current: CurrentSemester,
}

struct Shared {
    version: Arc<AtomicU64>,
    snapshots: watch::Sender<Option<Snapshot>>,
}

/// Handle for submitting plans and reading published evaluations.
///
/// Cloning is cheap. The worker stops when cancelled or when every handle
/// is dropped.
#[derive(Clone)]
pub struct RevalidatorHandle {
    shared: Arc<Shared>,
    published: watch::Receiver<Option<Arc<Published>>>,
    cancel: CancellationToken,
}

/// Start the worker on the current tokio runtime.
pub fn spawn(
    catalog: Arc<dyn Catalog>,
    categories: Arc<Vec<RequirementCategory>>,
    config: RevalidatorConfig,
    cancel: CancellationToken,
) -> (RevalidatorHandle, JoinHandle<()>) {
    let version = Arc::new(AtomicU64::new(0));
    let (snapshot_tx, snapshot_rx) = watch::channel(None);
    let (published_tx, published_rx) = watch::channel(None);

    let worker = Worker {
        catalog,
        categories,
        quiet_window: config.quiet_window,
        version: Arc::clone(&version),
        snapshots: snapshot_rx,
        published: published_tx,
        cancel: cancel.clone(),
    };
    let join = tokio::spawn(worker.run());

    let handle = RevalidatorHandle {
        shared: Arc::new(Shared {
            version,
            snapshots: snapshot_tx,
        }),
        published: published_rx,
        cancel,
    };
    (handle, join)
}

impl RevalidatorHandle {
    /// Queue `plan` for evaluation and return its version.
    pub fn submit(&self, plan: Plan, current: CurrentSemester) -> Result<u64, RevalidateError> {
        if self.shared.snapshots.is_closed() {
            return Err(RevalidateError::Stopped);
        }
        let plan = Arc::new(plan);
        let mut version = 0;
        // Bump and store under the channel lock so the stored snapshot
        // always carries the highest version.
        self.shared.snapshots.send_modify(|slot| {
            version = self.shared.version.fetch_add(1, Ordering::SeqCst) + 1;
            *slot = Some(Snapshot {
                version,
                plan,
                current,
            });
        });
        tracing::debug!(version, "plan submitted for revalidation");
        Ok(version)
    }

    /// Version of the most recent submission.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Option<Arc<Published>> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Published>>> {
        self.published.clone()
    }

    /// Wait until an evaluation at `version` or newer is published.
    pub async fn wait_for(&self, version: u64) -> Result<Arc<Published>, RevalidateError> {
        let mut rx = self.published.clone();
        let published = rx
            .wait_for(|p| p.as_ref().is_some_and(|p| p.version >= version))
            .await
            .map_err(|_| RevalidateError::Stopped)?;
        published.clone().ok_or(RevalidateError::Stopped)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    catalog: Arc<dyn Catalog>,
    categories: Arc<Vec<RequirementCategory>>,
    quiet_window: Duration,
    version: Arc<AtomicU64>,
    snapshots: watch::Receiver<Option<Snapshot>>,
    published: watch::Sender<Option<Arc<Published>>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(quiet_window = ?self.quiet_window, "revalidator started");

        loop {
            tokio::select! {
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.cancel.cancelled() => break,
            }

            if !self.settle().await {
                break;
            }

            let Some(snapshot) = self.snapshots.borrow_and_update().clone() else {
                continue;
            };
            self.run_once(snapshot).await;
        }

        tracing::debug!("revalidator stopped");
    }

    /// Wait out the quiet window, restarting it on every new submission.
    /// Returns `false` if the worker should stop.
    async fn settle(&mut self) -> bool {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.quiet_window) => return true,
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
                _ = self.cancel.cancelled() => return false,
            }
        }
    }

    async fn run_once(&self, snapshot: Snapshot) {
        let version = snapshot.version;
        let catalog = Arc::clone(&self.catalog);
        let categories = Arc::clone(&self.categories);

        let result = tokio::task::spawn_blocking(move || {
            evaluate(&snapshot.plan, snapshot.current, catalog.as_ref(), &categories)
        })
        .await;

        let evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(err) => {
                tracing::error!(version, error = %err, "evaluation task failed");
                return;
            }
        };

        let latest = self.version.load(Ordering::SeqCst);
        if latest != version {
            tracing::debug!(version, latest, "plan changed during evaluation, dropping result");
            return;
        }

        tracing::info!(
            version,
            violations = evaluation.violations.len(),
            "published plan evaluation"
        );
        self.published
            .send_replace(Some(Arc::new(Published { version, evaluation })));
    }
}
