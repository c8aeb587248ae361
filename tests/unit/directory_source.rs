use crate::helpers::modules::write_module;
use anyhow::Result;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tenantry::error::InstallError;
use tenantry::module::{DirectorySource, ModuleSource, Scope, TransactionMode};
use tenantry::registry::ModuleRegistry;

fn registry(dir: &TempDir) -> ModuleRegistry {
    ModuleRegistry::new(Arc::new(DirectorySource::new(dir.path())))
}

#[test]
fn test_discovers_modules_with_units_per_scope() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "module_registry", "version: 1.0.0\n", &[(
        Scope::Landlord,
        "001_registry.sql",
        "CREATE TABLE modules (name TEXT PRIMARY KEY);",
    )])?;
    write_module(
        dir.path(),
        "digital_card",
        "display_name: Digital Card\nversion: 2.3.0\ndependencies:\n  - module_registry\n",
        &[
            (
                Scope::Landlord,
                "001_card_types.sql",
                "CREATE TABLE card_types (id INT);",
            ),
            (
                Scope::Tenant,
                "002_cards.sql",
                "-- tenantry: affects=\"cards\" timeout=\"2m\"\nCREATE TABLE cards (id INT);\n-- tenantry:revert\nDROP TABLE IF EXISTS cards;\n",
            ),
            (
                Scope::Tenant,
                "001_card_settings.sql",
                "CREATE TABLE card_settings (id INT);",
            ),
        ],
    )?;

    let modules = registry(&dir).discover_all()?;

    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["digital_card", "module_registry"]);

    let card = &modules[0];
    assert_eq!(card.display_name, "Digital Card");
    assert_eq!(card.version, "2.3.0");
    assert!(card.dependencies.contains("module_registry"));
    assert_eq!(card.landlord_units.len(), 1);

    // Units come back sorted by file name regardless of creation order
    let tenant_ids: Vec<&str> = card.tenant_units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(tenant_ids, vec!["001_card_settings", "002_cards"]);

    let cards = &card.tenant_units[1];
    assert_eq!(cards.scope, Scope::Tenant);
    assert_eq!(cards.affected_entity.as_deref(), Some("cards"));
    assert_eq!(cards.timeout, Some(Duration::from_secs(120)));
    assert_eq!(cards.mode, TransactionMode::Transactional);
    assert_eq!(cards.apply_sql, "CREATE TABLE cards (id INT);");
    assert_eq!(cards.revert_sql.as_deref(), Some("DROP TABLE IF EXISTS cards;"));

    assert_eq!(modules[1].display_name, "module_registry");
    Ok(())
}

#[test]
fn test_manifest_name_overrides_directory_name() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "Cards Module", "name: cards\n", &[])?;

    let modules = registry(&dir).discover_all()?;

    assert_eq!(modules[0].name, "cards");
    Ok(())
}

#[test]
fn test_non_sql_files_and_hidden_directories_are_ignored() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "", &[
        (Scope::Tenant, "001_cards.sql", "CREATE TABLE cards (id INT);"),
        (Scope::Tenant, "README.md", "notes"),
    ])?;
    fs::create_dir_all(dir.path().join(".git"))?;

    let modules = registry(&dir).discover_all()?;

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].tenant_units.len(), 1);
    Ok(())
}

#[test]
fn test_unknown_dependency_is_a_discovery_error() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "dependencies: [loyalty]\n", &[])?;

    let err = registry(&dir).discover_all().unwrap_err();

    match err {
        InstallError::Discovery(message) => {
            assert!(message.contains("unknown module 'loyalty'"), "{}", message);
        }
        other => panic!("expected a discovery error, got {other}"),
    }
    Ok(())
}

#[test]
fn test_units_are_ordered_by_id_not_file_name() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "", &[
        (Scope::Tenant, "001-fix.sql", "ALTER TABLE cards ADD COLUMN holder TEXT;"),
        (Scope::Tenant, "001.sql", "CREATE TABLE cards (id INT);"),
    ])?;

    let module = registry(&dir).discover_one("cards")?;

    let ids: Vec<&str> = module.units(Scope::Tenant).iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["001", "001-fix"]);
    Ok(())
}

#[test]
fn test_invalid_unit_file_name_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "", &[(
        Scope::Tenant,
        "001 create cards.sql",
        "CREATE TABLE cards (id INT);",
    )])?;

    let err = registry(&dir).discover_all().unwrap_err();

    assert!(matches!(err, InstallError::Discovery(_)));
    assert!(err.to_string().contains("Invalid unit file name"));
    Ok(())
}

#[test]
fn test_empty_apply_body_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "", &[(
        Scope::Tenant,
        "001_cards.sql",
        "-- tenantry:revert\nDROP TABLE cards;",
    )])?;

    let err = registry(&dir).discover_all().unwrap_err();

    assert!(format!("{:#}", err).contains("empty apply body"));
    Ok(())
}

#[test]
fn test_missing_modules_directory_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let source = DirectorySource::new(dir.path().join("missing"));

    let err = source.load_modules().unwrap_err();

    assert!(err.to_string().contains("Modules directory not found"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlink_outside_modules_directory_is_rejected() -> Result<()> {
    let outside = TempDir::new()?;
    fs::write(outside.path().join("001_evil.sql"), "DROP TABLE cards;")?;

    let dir = TempDir::new()?;
    write_module(dir.path(), "cards", "", &[])?;
    let tenant_dir = dir.path().join("cards").join("tenant");
    fs::create_dir_all(&tenant_dir)?;
    std::os::unix::fs::symlink(
        outside.path().join("001_evil.sql"),
        tenant_dir.join("001_evil.sql"),
    )?;

    let err = registry(&dir).discover_all().unwrap_err();

    assert!(err.to_string().contains("Symlink points outside modules directory"));
    Ok(())
}
