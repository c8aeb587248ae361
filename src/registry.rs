use crate::error::{InstallError, InstallResult};
use crate::module::unit_parser::is_valid_unit_id;
use crate::module::{ModuleDescriptor, ModuleSource, Scope};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Discovers and validates every module known to the system.
///
/// Nothing is cached: each call re-reads the source, so edits to module
/// definitions are picked up by the next invocation.
#[derive(Clone)]
pub struct ModuleRegistry {
    source: Arc<dyn ModuleSource>,
}

impl ModuleRegistry {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self { source }
    }

    /// Every module, sorted by name
    pub fn discover_all(&self) -> InstallResult<Vec<ModuleDescriptor>> {
        let modules = self.source.load_modules().map_err(|e| {
            InstallError::Discovery(format!("{}: {:#}", self.source.describe(), e))
        })?;

        // First pass: each module on its own
        let mut by_name: BTreeMap<String, ModuleDescriptor> = BTreeMap::new();
        for module in modules {
            validate_module(&module)?;
            if by_name.contains_key(&module.name) {
                return Err(InstallError::Discovery(format!(
                    "Module name '{}' is declared more than once",
                    module.name
                )));
            }
            by_name.insert(module.name.clone(), module);
        }

        // Second pass: dependencies against the complete set
        for module in by_name.values() {
            for dependency in &module.dependencies {
                if !by_name.contains_key(dependency) {
                    return Err(InstallError::Discovery(format!(
                        "Module '{}' depends on unknown module '{}'",
                        module.name, dependency
                    )));
                }
            }
        }

        info!(
            "Discovered {} modules from {}",
            by_name.len(),
            self.source.describe()
        );

        Ok(by_name.into_values().collect())
    }

    pub fn discover_one(&self, name: &str) -> InstallResult<ModuleDescriptor> {
        self.discover_all()?
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| InstallError::ModuleNotFound(name.to_string()))
    }
}

fn validate_module(module: &ModuleDescriptor) -> InstallResult<()> {
    if !is_valid_module_name(&module.name) {
        return Err(InstallError::Discovery(format!(
            "Invalid module name '{}': use lowercase letters, digits, '_' and '-'",
            module.name
        )));
    }

    if module.dependencies.contains(&module.name) {
        return Err(InstallError::CyclicDependency(vec![
            module.name.clone(),
            module.name.clone(),
        ]));
    }

    for scope in [Scope::Landlord, Scope::Tenant] {
        let units = module.units(scope);

        for unit in units {
            if unit.scope != scope {
                return Err(InstallError::Discovery(format!(
                    "Unit '{}' of module '{}' is declared as {} but listed with {} units",
                    unit.id, module.name, unit.scope, scope
                )));
            }
            if !is_valid_unit_id(&unit.id) {
                return Err(InstallError::Discovery(format!(
                    "Invalid unit id '{}' in module '{}'",
                    unit.id, module.name
                )));
            }
        }

        // Strictly increasing also rules out duplicates
        for pair in units.windows(2) {
            if pair[0].id >= pair[1].id {
                return Err(InstallError::Discovery(format!(
                    "{} units of module '{}' are not strictly increasing: '{}' is followed by '{}'",
                    scope, module.name, pair[0].id, pair[1].id
                )));
            }
        }
    }

    Ok(())
}

fn is_valid_module_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
