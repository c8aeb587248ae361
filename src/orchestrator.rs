//! Coordinates discovery, dependency ordering, target resolution and runs
//! for a single install/plan/status request.

use crate::error::{InstallError, InstallResult};
use crate::ledger::{InstallStatus, Ledger, install_status};
use crate::module::{ModuleDescriptor, Scope};
use crate::registry::ModuleRegistry;
use crate::resolver::DependencyResolver;
use crate::runner::{CancelSignal, MigrationRunner, RunOutcome, RunResult};
use crate::tenancy::{InstallationTarget, TargetResolver, TenantSelector};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Pending units for one module on one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub module: String,
    pub target_key: String,
    pub scope: Scope,
    pub pending: Vec<String>,
}

/// Dry run of an install: what would be applied where, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationPlan {
    pub module: String,
    pub order: Vec<String>,
    pub steps: Vec<PlanStep>,
}

impl InstallationPlan {
    pub fn pending_count(&self) -> usize {
        self.steps.iter().map(|s| s.pending.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    Succeeded,
    Failed,
    Blocked,
    Cancelled,
}

#[derive(Debug)]
pub struct TargetReport {
    pub target_key: String,
    pub runs: Vec<RunResult>,
}

impl TargetReport {
    /// Worst outcome across runs: failed, then blocked, then cancelled
    pub fn outcome(&self) -> TargetOutcome {
        let has = |pred: fn(&RunOutcome) -> bool| self.runs.iter().any(|r| pred(&r.outcome));

        if has(|o| matches!(o, RunOutcome::Failed { .. })) {
            TargetOutcome::Failed
        } else if has(|o| matches!(o, RunOutcome::Blocked { .. })) {
            TargetOutcome::Blocked
        } else if has(|o| matches!(o, RunOutcome::Cancelled)) {
            TargetOutcome::Cancelled
        } else {
            TargetOutcome::Succeeded
        }
    }

    /// First module in order that did not finish
    fn first_unfinished(&self) -> Option<&str> {
        self.runs
            .iter()
            .find(|r| !r.is_success())
            .map(|r| r.module.as_str())
    }
}

#[derive(Debug)]
pub struct InstallationReport {
    pub module: String,
    pub order: Vec<String>,
    /// Landlord first, then tenants sorted by key
    pub targets: Vec<TargetReport>,
}

impl InstallationReport {
    pub fn succeeded(&self) -> bool {
        self.targets
            .iter()
            .all(|t| t.outcome() == TargetOutcome::Succeeded)
    }

    pub fn target(&self, key: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.target_key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub module: String,
    pub target_key: String,
    pub status: InstallStatus,
    pub applied: usize,
    pub declared: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub dependencies: Vec<String>,
    pub landlord_units: usize,
    pub tenant_units: usize,
}

impl From<&ModuleDescriptor> for ModuleSummary {
    fn from(module: &ModuleDescriptor) -> Self {
        Self {
            name: module.name.clone(),
            display_name: module.display_name.clone(),
            version: module.version.clone(),
            dependencies: module.dependencies.iter().cloned().collect(),
            landlord_units: module.landlord_units.len(),
            tenant_units: module.tenant_units.len(),
        }
    }
}

/// Everything resolved before any target is touched
struct Resolved {
    order: Vec<String>,
    modules: Vec<ModuleDescriptor>,
    landlord: Option<InstallationTarget>,
    tenants: Vec<InstallationTarget>,
}

impl Resolved {
    fn targets(&self) -> impl Iterator<Item = &InstallationTarget> {
        self.landlord.iter().chain(self.tenants.iter())
    }

    fn modules_for(&self, scope: Scope) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.iter().filter(move |m| m.has_units(scope))
    }
}

pub struct Orchestrator {
    registry: ModuleRegistry,
    targets: TargetResolver,
    ledger: Arc<dyn Ledger>,
    runner: Arc<MigrationRunner>,
    max_concurrent_targets: usize,
}

impl Orchestrator {
    pub fn new(
        registry: ModuleRegistry,
        targets: TargetResolver,
        ledger: Arc<dyn Ledger>,
        runner: Arc<MigrationRunner>,
        max_concurrent_targets: usize,
    ) -> Self {
        Self {
            registry,
            targets,
            ledger,
            runner,
            max_concurrent_targets: max_concurrent_targets.max(1),
        }
    }

    /// Discover, order and resolve targets; fails before any side effect
    async fn resolve(
        &self,
        module: &str,
        selector: Option<&TenantSelector>,
    ) -> InstallResult<Resolved> {
        let all = self.registry.discover_all()?;
        let order = DependencyResolver::new(&all)?.resolve(&[module])?;

        let modules: Vec<ModuleDescriptor> = order
            .iter()
            .map(|name| {
                all.iter()
                    .find(|m| &m.name == name)
                    .cloned()
                    .ok_or_else(|| InstallError::ModuleNotFound(name.clone()))
            })
            .collect::<InstallResult<_>>()?;

        let needs_landlord = modules.iter().any(|m| m.has_units(Scope::Landlord));
        let needs_tenants = modules.iter().any(|m| m.has_units(Scope::Tenant));

        // An explicit selector is validated even when nothing targets tenants
        let tenants = match selector {
            Some(selector) => {
                let tenants = self.targets.resolve_tenants(selector).await?;
                if needs_tenants { tenants } else { Vec::new() }
            }
            None => {
                if needs_tenants {
                    warn!(
                        "'{}' has tenant units but no tenants were selected; only the landlord is considered",
                        module
                    );
                }
                Vec::new()
            }
        };

        Ok(Resolved {
            order,
            modules,
            landlord: needs_landlord.then(|| self.targets.resolve_landlord()),
            tenants,
        })
    }

    /// Pending units per `(module, target)` without applying anything
    pub async fn plan(
        &self,
        module: &str,
        selector: Option<&TenantSelector>,
    ) -> InstallResult<InstallationPlan> {
        let resolved = self.resolve(module, selector).await?;
        let mut steps = Vec::new();

        for target in resolved.targets() {
            for descriptor in resolved.modules_for(target.scope()) {
                let applied: HashSet<String> = self
                    .ledger
                    .applied_units(&descriptor.name, target)
                    .await?
                    .into_iter()
                    .map(|e| e.unit_id)
                    .collect();

                steps.push(PlanStep {
                    module: descriptor.name.clone(),
                    target_key: target.key(),
                    scope: target.scope(),
                    pending: descriptor
                        .units(target.scope())
                        .iter()
                        .filter(|u| !applied.contains(&u.id))
                        .map(|u| u.id.clone())
                        .collect(),
                });
            }
        }

        Ok(InstallationPlan {
            module: module.to_string(),
            order: resolved.order,
            steps,
        })
    }

    /// Install `module` and its dependencies on the landlord, then on the selected tenants.
    ///
    /// Errors are returned only for problems found before execution starts;
    /// afterwards every outcome is in the report.
    pub async fn install(
        &self,
        module: &str,
        selector: Option<&TenantSelector>,
        cancel: &CancelSignal,
    ) -> InstallResult<InstallationReport> {
        let resolved = self.resolve(module, selector).await?;
        info!(
            "Installing '{}' ({} modules) on {} targets",
            module,
            resolved.order.len(),
            resolved.targets().count()
        );

        let mut targets = Vec::new();
        let mut landlord_failure: Option<String> = None;

        if let Some(landlord) = &resolved.landlord {
            let report = self.run_target(&resolved, landlord, cancel, None).await;
            landlord_failure = report.first_unfinished().map(str::to_string);
            targets.push(report);
        }

        if let Some(failed) = &landlord_failure {
            warn!(
                "Landlord did not finish '{}'; tenants only receive modules ordered before it",
                failed
            );
        }

        let mut tenant_reports: Vec<TargetReport> = stream::iter(resolved.tenants.iter())
            .map(|tenant| self.run_target(&resolved, tenant, cancel, landlord_failure.as_deref()))
            .buffer_unordered(self.max_concurrent_targets)
            .collect()
            .await;
        tenant_reports.sort_by(|a, b| a.target_key.cmp(&b.target_key));
        targets.extend(tenant_reports);

        Ok(InstallationReport {
            module: module.to_string(),
            order: resolved.order,
            targets,
        })
    }

    /// Run every ordered module with units for the target's scope.
    ///
    /// A module that does not finish blocks its dependents on this target only,
    /// including dependents that reach it through modules with no units here.
    /// `landlord_failure` blocks that module and everything ordered after it.
    /// Once cancellation is requested every remaining module is reported cancelled.
    async fn run_target(
        &self,
        resolved: &Resolved,
        target: &InstallationTarget,
        cancel: &CancelSignal,
        landlord_failure: Option<&str>,
    ) -> TargetReport {
        let mut runs = Vec::new();
        // Module that did not finish on this target, mapped to the module reported as the blocker
        let mut unfinished: BTreeMap<&str, &str> = BTreeMap::new();
        let mut past_landlord_failure = false;

        for module in &resolved.modules {
            past_landlord_failure |= landlord_failure == Some(module.name.as_str());

            let upstream = module
                .dependencies
                .iter()
                .find_map(|dep| unfinished.get(dep.as_str()).copied());

            if !module.has_units(target.scope()) {
                if let Some(cause) = upstream {
                    unfinished.insert(module.name.as_str(), cause);
                }
                continue;
            }

            let blocked_by = upstream.or(landlord_failure.filter(|_| past_landlord_failure));

            let result = if cancel.is_cancelled() {
                RunResult::cancelled(&module.name, target)
            } else if let Some(by) = blocked_by {
                RunResult::blocked(&module.name, target, by)
            } else {
                self.runner.run(module, target, cancel).await
            };

            if !result.is_success() {
                unfinished.insert(module.name.as_str(), module.name.as_str());
            }
            runs.push(result);
        }

        TargetReport {
            target_key: target.key(),
            runs,
        }
    }

    /// Installation status of `module` and its dependencies on each target
    pub async fn status(
        &self,
        module: &str,
        selector: Option<&TenantSelector>,
    ) -> InstallResult<Vec<StatusRow>> {
        let resolved = self.resolve(module, selector).await?;
        let mut rows = Vec::new();

        for target in resolved.targets() {
            for descriptor in resolved.modules_for(target.scope()) {
                let declared = descriptor.units(target.scope());
                let applied = self.ledger.applied_units(&descriptor.name, target).await?;
                let declared_ids: HashSet<&str> = declared.iter().map(|u| u.id.as_str()).collect();

                rows.push(StatusRow {
                    module: descriptor.name.clone(),
                    target_key: target.key(),
                    status: install_status(declared, &applied),
                    applied: applied
                        .iter()
                        .filter(|e| declared_ids.contains(e.unit_id.as_str()))
                        .count(),
                    declared: declared.len(),
                });
            }
        }

        Ok(rows)
    }

    /// Every discoverable module, sorted by name
    pub fn list(&self) -> InstallResult<Vec<ModuleSummary>> {
        Ok(self
            .registry
            .discover_all()?
            .iter()
            .map(ModuleSummary::from)
            .collect())
    }
}
