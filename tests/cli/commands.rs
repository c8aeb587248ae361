use crate::helpers::cli::CliTestHelper;
use anyhow::Result;
use predicates::prelude::*;
use tenantry::module::Scope;

fn write_digital_card(helper: &CliTestHelper) -> Result<()> {
    helper.write_module("module_registry", "version: 1.0.0\n", &[(
        Scope::Landlord,
        "001_registry.sql",
        "CREATE TABLE modules (name TEXT PRIMARY KEY);",
    )])?;
    helper.write_module(
        "digital_card",
        "display_name: Digital Card\nversion: 2.0.0\ndependencies: [module_registry]\n",
        &[
            (Scope::Landlord, "001_card_types.sql", "CREATE TABLE card_types (id INT);"),
            (Scope::Tenant, "001_cards.sql", "CREATE TABLE cards (id INT);"),
            (Scope::Tenant, "002_card_index.sql", "CREATE INDEX ON cards (id);"),
        ],
    )
}

#[test]
fn test_help_lists_commands() {
    let helper = CliTestHelper::new().unwrap();

    helper
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_list_modules() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;
    write_digital_card(&helper)?;

    helper
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "digital_card 2.0.0 (1 landlord, 2 tenant units) requires module_registry",
        ))
        .stdout(predicate::str::contains("Digital Card"))
        .stdout(predicate::str::contains(
            "module_registry 1.0.0 (1 landlord, 0 tenant units)",
        ));

    Ok(())
}

#[test]
fn test_list_modules_as_json() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&[])?;
    write_digital_card(&helper)?;

    let output = helper
        .command()
        .args(["list", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let modules: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(modules[0]["name"], "digital_card");
    assert_eq!(modules[0]["dependencies"], serde_json::json!(["module_registry"]));
    assert_eq!(modules[0]["tenant_units"], 2);
    assert_eq!(modules[1]["name"], "module_registry");

    Ok(())
}

#[test]
fn test_list_with_empty_modules_directory() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&[])?;

    helper
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules found"));

    Ok(())
}

#[test]
fn test_modules_dir_flag_overrides_config() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&[])?;
    crate::helpers::modules::write_module(
        &helper.project_root.join("elsewhere"),
        "audit",
        "",
        &[],
    )?;

    helper
        .command()
        .args(["list", "--modules-dir", "elsewhere"])
        .assert()
        .success()
        .stdout(predicate::str::contains("audit"));

    Ok(())
}

#[test]
fn test_plan_module_without_units_needs_no_database() -> Result<()> {
    let helper = CliTestHelper::new()?;
    helper.init_project(&["acme"])?;
    helper.write_module("placeholder", "", &[])?;

    helper
        .command()
        .args(["plan", "placeholder", "--tenant", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No targets selected"));

    Ok(())
}
