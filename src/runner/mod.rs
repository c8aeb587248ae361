//! Applies one module's pending units to one target.

pub mod cancel;
pub mod retry;

pub use cancel::CancelSignal;
pub use retry::calculate_retry_delay;

use crate::config::RetryConfig;
use crate::error::{InstallError, InstallResult};
use crate::ledger::{Ledger, LedgerEntry, LedgerLock};
use crate::module::{ModuleDescriptor, SchemaChangeUnit};
use crate::session::{SessionProvider, StatementTimeout, TargetSession};
use crate::tenancy::InstallationTarget;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum RunOutcome {
    /// At least one unit was applied and nothing failed
    Applied,
    /// Every declared unit was already recorded
    UpToDate,
    /// Stopped at `unit_id`; units applied before it stay recorded
    Failed {
        unit_id: Option<String>,
        error: InstallError,
    },
    /// Stopped between units, or never started, because of a shutdown request
    Cancelled,
    /// Not attempted because a module it depends on did not finish on this target
    Blocked { by: String },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::UpToDate => "up_to_date",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
            Self::Blocked { .. } => "blocked",
        }
    }
}

/// Outcome of one `(module, target)` run
#[derive(Debug)]
pub struct RunResult {
    pub module: String,
    pub target_key: String,
    /// Units applied by this run, in order
    pub applied: Vec<String>,
    pub outcome: RunOutcome,
    pub duration: Duration,
}

impl RunResult {
    fn new(module: &str, target: &InstallationTarget, outcome: RunOutcome) -> Self {
        Self {
            module: module.to_string(),
            target_key: target.key(),
            applied: Vec::new(),
            outcome,
            duration: Duration::ZERO,
        }
    }

    pub fn blocked(module: &str, target: &InstallationTarget, by: &str) -> Self {
        Self::new(module, target, RunOutcome::Blocked { by: by.to_string() })
    }

    pub fn cancelled(module: &str, target: &InstallationTarget) -> Self {
        Self::new(module, target, RunOutcome::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Applied | RunOutcome::UpToDate)
    }

    /// Nothing was pending
    pub fn skipped(&self) -> bool {
        matches!(self.outcome, RunOutcome::UpToDate)
    }

    pub fn failed_at(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Failed { unit_id, .. } => unit_id.as_deref(),
            _ => None,
        }
    }
}

pub struct MigrationRunner {
    ledger: Arc<dyn Ledger>,
    sessions: Arc<dyn SessionProvider>,
    unit_timeout: Duration,
    lock_retry: RetryConfig,
}

impl MigrationRunner {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        sessions: Arc<dyn SessionProvider>,
        unit_timeout: Duration,
        lock_retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            sessions,
            unit_timeout,
            lock_retry,
        }
    }

    /// Apply every pending unit of `module` for the target's scope, in declared order.
    ///
    /// Never returns an error: every failure is captured in the result so other
    /// targets keep going.
    pub async fn run(
        &self,
        module: &ModuleDescriptor,
        target: &InstallationTarget,
        cancel: &CancelSignal,
    ) -> RunResult {
        let start = Instant::now();
        let mut result = RunResult::new(&module.name, target, RunOutcome::UpToDate);

        let mut lock = match self.acquire_lock(module, target).await {
            Ok(lock) => lock,
            Err(error) => {
                warn!(module = %module.name, target_key = %target, "{}", error);
                result.outcome = RunOutcome::Failed {
                    unit_id: None,
                    error,
                };
                return result;
            }
        };

        result.outcome = self
            .run_locked(module, target, cancel, &mut result.applied)
            .await;

        if let Err(e) = lock.release().await {
            warn!(module = %module.name, target_key = %target, "Failed to release lock: {:#}", e);
        }

        result.duration = start.elapsed();
        result
    }

    async fn acquire_lock(
        &self,
        module: &ModuleDescriptor,
        target: &InstallationTarget,
    ) -> InstallResult<Box<dyn LedgerLock>> {
        for attempt in 1..=self.lock_retry.attempts {
            if let Some(lock) = self.ledger.try_lock(&module.name, target).await? {
                return Ok(lock);
            }

            if attempt < self.lock_retry.attempts {
                let delay = calculate_retry_delay(&self.lock_retry, attempt);
                debug!(
                    "Lock for '{}' on {} is held elsewhere, retrying in {:?} ({}/{})",
                    module.name, target, delay, attempt, self.lock_retry.attempts
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(InstallError::LockContention {
            module: module.name.clone(),
            target: target.key(),
        })
    }

    async fn run_locked(
        &self,
        module: &ModuleDescriptor,
        target: &InstallationTarget,
        cancel: &CancelSignal,
        applied: &mut Vec<String>,
    ) -> RunOutcome {
        let recorded = match self.ledger.applied_units(&module.name, target).await {
            Ok(entries) => entries,
            Err(error) => {
                return RunOutcome::Failed {
                    unit_id: None,
                    error,
                };
            }
        };

        let recorded: HashMap<&str, &LedgerEntry> =
            recorded.iter().map(|e| (e.unit_id.as_str(), e)).collect();
        let declared = module.units(target.scope());

        // Applied units are immutable
        for unit in declared {
            if let Some(entry) = recorded.get(unit.id.as_str()) {
                let current = unit.checksum();
                if entry.checksum != current {
                    return RunOutcome::Failed {
                        unit_id: Some(unit.id.clone()),
                        error: InstallError::ChecksumMismatch {
                            module: module.name.clone(),
                            target: target.key(),
                            unit_id: unit.id.clone(),
                            recorded: entry.checksum.clone(),
                            current,
                        },
                    };
                }
            }
        }

        let pending: Vec<&SchemaChangeUnit> = declared
            .iter()
            .filter(|unit| !recorded.contains_key(unit.id.as_str()))
            .collect();

        let Some(first) = pending.first() else {
            debug!("'{}' is up to date on {}", module.name, target);
            return RunOutcome::UpToDate;
        };

        if cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        let mut session = match self.sessions.open(target).await {
            Ok(session) => session,
            Err(e) => {
                return RunOutcome::Failed {
                    unit_id: Some(first.id.clone()),
                    error: e.into(),
                };
            }
        };

        for unit in pending {
            if cancel.is_cancelled() {
                info!(
                    module = %module.name,
                    target_key = %target,
                    "Cancelled after {} of the pending units",
                    applied.len()
                );
                return RunOutcome::Cancelled;
            }

            let timeout = unit.timeout.unwrap_or(self.unit_timeout);
            let started = Instant::now();

            let attempt = tokio::time::timeout(timeout, session.apply(unit, timeout)).await;
            let error = match attempt {
                Ok(Ok(())) => None,
                Ok(Err(e)) if e.downcast_ref::<StatementTimeout>().is_some() => {
                    Some(self.timeout_error(module, target, unit, timeout))
                }
                Ok(Err(e)) => Some(InstallError::UnitApplication {
                    module: module.name.clone(),
                    target: target.key(),
                    unit_id: unit.id.clone(),
                    message: format!("{:#}", e),
                }),
                Err(_) => {
                    // The interrupted session may be mid-statement
                    match self.sessions.open(target).await {
                        Ok(fresh) => session = fresh,
                        Err(e) => warn!("Failed to reopen session on {}: {:#}", target, e),
                    }
                    Some(self.timeout_error(module, target, unit, timeout))
                }
            };

            if let Some(error) = error {
                warn!(
                    module = %module.name,
                    target_key = %target,
                    unit = %unit.id,
                    "{}",
                    error
                );
                self.revert(session.as_mut(), unit, target, timeout).await;
                return RunOutcome::Failed {
                    unit_id: Some(unit.id.clone()),
                    error,
                };
            }

            let entry = LedgerEntry::applied(&module.name, target, unit);
            if let Err(error) = self.ledger.record(&entry).await {
                if matches!(error, InstallError::DuplicateApplication { .. }) {
                    error!(module = %module.name, target_key = %target, unit = %unit.id, "{}", error);
                } else {
                    error!(
                        module = %module.name,
                        target_key = %target,
                        unit = %unit.id,
                        "Unit applied but could not be recorded: {}",
                        error
                    );
                }
                return RunOutcome::Failed {
                    unit_id: Some(unit.id.clone()),
                    error,
                };
            }

            info!(
                module = %module.name,
                target_key = %target,
                unit = %unit.id,
                "Applied in {:.2}s",
                started.elapsed().as_secs_f64()
            );
            applied.push(unit.id.clone());
        }

        RunOutcome::Applied
    }

    fn timeout_error(
        &self,
        module: &ModuleDescriptor,
        target: &InstallationTarget,
        unit: &SchemaChangeUnit,
        timeout: Duration,
    ) -> InstallError {
        InstallError::UnitTimeout {
            module: module.name.clone(),
            target: target.key(),
            unit_id: unit.id.clone(),
            timeout,
        }
    }

    /// Best effort; a failing revert is logged and the original error reported
    async fn revert(
        &self,
        session: &mut dyn TargetSession,
        unit: &SchemaChangeUnit,
        target: &InstallationTarget,
        timeout: Duration,
    ) {
        if !unit.has_revert() {
            return;
        }

        match tokio::time::timeout(timeout, session.revert(unit, timeout)).await {
            Ok(Ok(())) => debug!("Reverted unit '{}' on {}", unit.id, target),
            Ok(Err(e)) => warn!("Revert of unit '{}' on {} failed: {:#}", unit.id, target, e),
            Err(_) => warn!(
                "Revert of unit '{}' on {} timed out after {:?}",
                unit.id, target, timeout
            ),
        }
    }
}
