use anyhow::Result;
use std::fs;
use std::path::Path;
use tenantry::module::{ModuleDescriptor, SchemaChangeUnit, Scope};

pub fn landlord_unit(id: &str) -> SchemaChangeUnit {
    SchemaChangeUnit::new(id, Scope::Landlord, format!("CREATE TABLE landlord_{} (id INT);", id))
}

pub fn tenant_unit(id: &str) -> SchemaChangeUnit {
    SchemaChangeUnit::new(id, Scope::Tenant, format!("CREATE TABLE tenant_{} (id INT);", id))
}

/// `module_registry` (landlord R1) and `digital_card` (landlord L1, tenant T1, T2)
pub fn digital_card_modules() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::new("module_registry").with_unit(landlord_unit("R1")),
        ModuleDescriptor::new("digital_card")
            .depends_on("module_registry")
            .with_unit(landlord_unit("L1"))
            .with_unit(tenant_unit("T1"))
            .with_unit(tenant_unit("T2")),
    ]
}

/// A single tenant-only module with the given unit ids
pub fn tenant_module(name: &str, unit_ids: &[&str]) -> ModuleDescriptor {
    unit_ids
        .iter()
        .fold(ModuleDescriptor::new(name), |module, id| {
            module.with_unit(tenant_unit(id))
        })
}

/// Write a module directory: `<modules_dir>/<name>/{module.yaml,landlord/,tenant/}`
pub fn write_module(
    modules_dir: &Path,
    name: &str,
    manifest: &str,
    units: &[(Scope, &str, &str)],
) -> Result<()> {
    let module_dir = modules_dir.join(name);
    fs::create_dir_all(&module_dir)?;
    fs::write(module_dir.join("module.yaml"), manifest)?;

    for (scope, filename, content) in units {
        let scope_dir = module_dir.join(scope.subdir());
        fs::create_dir_all(&scope_dir)?;
        fs::write(scope_dir.join(filename), content)?;
    }

    Ok(())
}
