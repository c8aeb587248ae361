use crate::helpers::engine::{TestEngine, one};
use crate::helpers::modules::{digital_card_modules, tenant_module};
use anyhow::Result;
use tenantry::ledger::{InstallStatus, Ledger};
use tenantry::module::{ModuleDescriptor, Scope};
use tenantry::orchestrator::PlanStep;
use tenantry::runner::CancelSignal;
use tenantry::tenancy::InstallationTarget;

fn step(module: &str, target_key: &str, scope: Scope, pending: &[&str]) -> PlanStep {
    PlanStep {
        module: module.to_string(),
        target_key: target_key.to_string(),
        scope,
        pending: pending.iter().map(|p| p.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_plan_lists_every_pending_unit_without_side_effects() -> Result<()> {
    let engine = TestEngine::new(digital_card_modules(), &["acme"]);

    let plan = engine
        .orchestrator
        .plan("digital_card", Some(&one("acme")))
        .await?;

    assert_eq!(plan.order, vec!["module_registry", "digital_card"]);
    assert_eq!(
        plan.steps,
        vec![
            step("module_registry", "landlord", Scope::Landlord, &["R1"]),
            step("digital_card", "landlord", Scope::Landlord, &["L1"]),
            step("digital_card", "tenant:acme", Scope::Tenant, &["T1", "T2"]),
        ]
    );
    assert_eq!(plan.pending_count(), 4);

    assert!(engine.sessions.calls().is_empty());
    assert_eq!(engine.sessions.sessions_opened(), 0);
    assert!(engine.ledger.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_plan_is_deterministic() -> Result<()> {
    let engine = TestEngine::new(digital_card_modules(), &["acme"]);

    let first = engine.orchestrator.plan("digital_card", Some(&one("acme"))).await?;
    let second = engine.orchestrator.plan("digital_card", Some(&one("acme"))).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_plan_after_partial_install_shows_remaining_units() -> Result<()> {
    let engine = TestEngine::new(vec![tenant_module("cards", &["T1", "T2", "T3"])], &["acme"]);
    engine.sessions.fail_on(None, "T2");
    engine
        .orchestrator
        .install("cards", Some(&one("acme")), &CancelSignal::new())
        .await?;

    let plan = engine.orchestrator.plan("cards", Some(&one("acme"))).await?;

    assert_eq!(
        plan.steps,
        vec![step("cards", "tenant:acme", Scope::Tenant, &["T2", "T3"])]
    );
    Ok(())
}

#[tokio::test]
async fn test_plan_after_full_install_is_empty() -> Result<()> {
    let engine = TestEngine::new(digital_card_modules(), &["acme"]);
    engine
        .orchestrator
        .install("digital_card", Some(&one("acme")), &CancelSignal::new())
        .await?;

    let plan = engine.orchestrator.plan("digital_card", Some(&one("acme"))).await?;

    assert_eq!(plan.pending_count(), 0);
    assert_eq!(plan.steps.len(), 3);
    Ok(())
}

async fn statuses(engine: &TestEngine) -> Result<Vec<(InstallStatus, usize, usize)>> {
    Ok(engine
        .orchestrator
        .status("cards", Some(&one("acme")))
        .await?
        .into_iter()
        .map(|row| (row.status, row.applied, row.declared))
        .collect())
}

#[tokio::test]
async fn test_status_tracks_progress() -> Result<()> {
    let engine = TestEngine::new(vec![tenant_module("cards", &["T1", "T2"])], &["acme"]);
    assert_eq!(statuses(&engine).await?, vec![(InstallStatus::NotInstalled, 0, 2)]);

    engine.sessions.fail_on(None, "T2");
    engine
        .orchestrator
        .install("cards", Some(&one("acme")), &CancelSignal::new())
        .await?;
    assert_eq!(
        statuses(&engine).await?,
        vec![(InstallStatus::PartiallyInstalled, 1, 2)]
    );

    engine.sessions.clear_failures();
    engine
        .orchestrator
        .install("cards", Some(&one("acme")), &CancelSignal::new())
        .await?;
    assert_eq!(statuses(&engine).await?, vec![(InstallStatus::FullyInstalled, 2, 2)]);
    Ok(())
}

#[tokio::test]
async fn test_status_covers_dependencies_per_target() -> Result<()> {
    let engine = TestEngine::new(digital_card_modules(), &["acme"]);
    engine
        .orchestrator
        .install("digital_card", None, &CancelSignal::new())
        .await?;

    let rows = engine
        .orchestrator
        .status("digital_card", Some(&one("acme")))
        .await?;

    let summary: Vec<(&str, &str, InstallStatus)> = rows
        .iter()
        .map(|r| (r.module.as_str(), r.target_key.as_str(), r.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("module_registry", "landlord", InstallStatus::FullyInstalled),
            ("digital_card", "landlord", InstallStatus::FullyInstalled),
            ("digital_card", "tenant:acme", InstallStatus::NotInstalled),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_ledger_status_for_a_single_pair() -> Result<()> {
    let engine = TestEngine::new(vec![tenant_module("cards", &["T1"])], &["acme"]);
    let target = InstallationTarget::tenant("acme", "postgres://db/acme");
    let module = tenant_module("cards", &["T1"]);

    assert_eq!(
        engine.ledger.status(&module, &target).await?,
        InstallStatus::NotInstalled
    );

    engine
        .orchestrator
        .install("cards", Some(&one("acme")), &CancelSignal::new())
        .await?;

    assert_eq!(
        engine.ledger.status(&module, &target).await?,
        InstallStatus::FullyInstalled
    );
    // A module with nothing declared for the scope counts as installed
    assert_eq!(
        engine
            .ledger
            .status(&ModuleDescriptor::new("empty"), &target)
            .await?,
        InstallStatus::FullyInstalled
    );
    Ok(())
}

#[tokio::test]
async fn test_list_returns_sorted_summaries() -> Result<()> {
    let mut modules = digital_card_modules();
    modules.push(
        ModuleDescriptor::new("audit")
            .with_display_name("Audit Trail")
            .with_version("2.1.0"),
    );
    let engine = TestEngine::new(modules, &[]);

    let listed = engine.orchestrator.list()?;

    let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["audit", "digital_card", "module_registry"]);
    assert_eq!(listed[0].display_name, "Audit Trail");
    assert_eq!(listed[0].version, "2.1.0");
    assert_eq!(listed[1].dependencies, vec!["module_registry"]);
    assert_eq!((listed[1].landlord_units, listed[1].tenant_units), (1, 2));
    Ok(())
}
