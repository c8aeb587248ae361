use crate::helpers::cli::CliTestHelper;
use anyhow::Result;
use predicates::prelude::*;
use tenantry::constants::EXIT_ABORTED;
use tenantry::module::Scope;

// Every case here fails before a database is contacted; the configured
// landlord URL points at a closed port.

#[test]
fn test_cyclic_dependencies_abort() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;
    helper.write_module("billing", "dependencies: [membership]\n", &[(
        Scope::Landlord,
        "001.sql",
        "SELECT 1;",
    )])?;
    helper.write_module("membership", "dependencies: [billing]\n", &[(
        Scope::Landlord,
        "001.sql",
        "SELECT 1;",
    )])?;

    helper
        .command()
        .args(["plan", "billing"])
        .assert()
        .code(EXIT_ABORTED)
        .stderr(predicate::str::contains(
            "Cyclic module dependency: billing -> membership -> billing",
        ));

    Ok(())
}

#[test]
fn test_unknown_module_aborts() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;
    helper.write_module("cards", "", &[])?;

    helper
        .command()
        .args(["install", "loyalty", "--tenant", "acme"])
        .assert()
        .code(EXIT_ABORTED)
        .stderr(predicate::str::contains("Module 'loyalty' not found"));

    Ok(())
}

#[test]
fn test_unknown_tenant_aborts() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;
    helper.write_module("cards", "", &[(Scope::Tenant, "001.sql", "SELECT 1;")])?;

    helper
        .command()
        .args(["install", "cards", "--tenant", "acme", "--tenant", "nobody"])
        .assert()
        .code(EXIT_ABORTED)
        .stderr(predicate::str::contains("Unknown tenant 'nobody'"));

    Ok(())
}

#[test]
fn test_invalid_module_definition_aborts() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&[])?;
    helper.write_module("cards", "dependencies: [loyalty]\n", &[])?;

    helper
        .command()
        .arg("list")
        .assert()
        .code(EXIT_ABORTED)
        .stderr(predicate::str::contains("depends on unknown module 'loyalty'"));

    Ok(())
}

#[test]
fn test_tenant_and_all_tenants_conflict() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;

    helper
        .command()
        .args(["install", "cards", "--tenant", "acme", "--all-tenants"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));

    Ok(())
}

#[test]
fn test_invalid_config_aborts() -> Result<()> {
    let helper = CliTestHelper::new()?;
    std::fs::write(
        helper.project_root.join("tenantry.yaml"),
        "execution:\n  max_concurrent_targets: 0\n",
    )?;

    helper
        .command()
        .arg("list")
        .assert()
        .code(EXIT_ABORTED)
        .stderr(predicate::str::contains("max_concurrent_targets must be at least 1"));

    Ok(())
}
