//! Migration definition sources.
//!
//! A [`ModuleSource`] produces raw [`ModuleDescriptor`]s; validation happens
//! in the [`ModuleRegistry`](crate::registry::ModuleRegistry) so every source
//! is held to the same rules.

use crate::constants::{MODULE_MANIFEST_FILENAME, UNIT_FILE_EXTENSION};
use crate::module::descriptor::{ModuleDescriptor, Scope};
use crate::module::manifest::ModuleManifest;
use crate::module::unit_parser::{parse_unit, parse_unit_filename};
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait ModuleSource: Send + Sync {
    /// Human-readable origin, used in error messages
    fn describe(&self) -> String;

    fn load_modules(&self) -> Result<Vec<ModuleDescriptor>>;
}

/// Scans `<modules_dir>/<module>/{module.yaml,landlord/*.sql,tenant/*.sql}`
pub struct DirectorySource {
    modules_dir: PathBuf,
}

impl DirectorySource {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    fn load_module(&self, module_dir: &Path) -> Result<ModuleDescriptor> {
        let dir_name = module_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid module directory name: {}", module_dir.display()))?;

        let manifest_path = module_dir.join(MODULE_MANIFEST_FILENAME);
        let manifest = if manifest_path.is_file() {
            ModuleManifest::load(&manifest_path)?
        } else {
            ModuleManifest::default()
        };

        let name = manifest.name.unwrap_or_else(|| dir_name.to_string());
        let mut module = ModuleDescriptor::new(&name);
        if let Some(display_name) = manifest.display_name {
            module.display_name = display_name;
        }
        if let Some(version) = manifest.version {
            module.version = version;
        }
        module.dependencies = manifest.dependencies.into_iter().collect::<BTreeSet<_>>();

        for scope in [Scope::Landlord, Scope::Tenant] {
            let mut units = Vec::new();
            for path in self.unit_files(&module_dir.join(scope.subdir()))? {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                let id = parse_unit_filename(filename).ok_or_else(|| {
                    anyhow!(
                        "Invalid unit file name '{}' in module '{}': expected <id>.{}",
                        filename,
                        name,
                        UNIT_FILE_EXTENSION
                    )
                })?;

                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read unit file {}", path.display()))?;
                let unit = parse_unit(id, scope, &content)
                    .with_context(|| format!("Failed to parse unit file {}", path.display()))?;

                units.push(unit);
            }

            units.sort_by(|a, b| a.id.cmp(&b.id));
            for unit in units {
                module = module.with_unit(unit);
            }
        }

        debug!(
            "Loaded module '{}' ({} landlord, {} tenant units)",
            module.name,
            module.landlord_units.len(),
            module.tenant_units.len()
        );

        Ok(module)
    }

    /// Unit files of one scope directory
    fn unit_files(&self, scope_dir: &Path) -> Result<Vec<PathBuf>> {
        if !scope_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(scope_dir)
            .with_context(|| format!("Failed to read directory: {}", scope_dir.display()))?
        {
            let path = entry?.path();
            self.check_symlink(&path)?;

            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == UNIT_FILE_EXTENSION)
            {
                files.push(path);
            }
        }

        Ok(files)
    }

    /// Symlinks must not point outside the modules directory
    fn check_symlink(&self, path: &Path) -> Result<()> {
        if !path.is_symlink() {
            return Ok(());
        }

        let real_path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve symlink: {}", path.display()))?;
        let modules_dir_canonical = fs::canonicalize(&self.modules_dir).with_context(|| {
            format!(
                "Failed to resolve modules directory: {}",
                self.modules_dir.display()
            )
        })?;

        if !real_path.starts_with(&modules_dir_canonical) {
            return Err(anyhow!(
                "Symlink points outside modules directory: {} -> {}",
                path.display(),
                real_path.display()
            ));
        }

        Ok(())
    }
}

impl ModuleSource for DirectorySource {
    fn describe(&self) -> String {
        format!("modules directory {}", self.modules_dir.display())
    }

    fn load_modules(&self) -> Result<Vec<ModuleDescriptor>> {
        if !self.modules_dir.is_dir() {
            return Err(anyhow!(
                "Modules directory not found: {}",
                self.modules_dir.display()
            ));
        }

        let mut module_dirs = Vec::new();
        for entry in fs::read_dir(&self.modules_dir).with_context(|| {
            format!("Failed to read directory: {}", self.modules_dir.display())
        })? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));

            if path.is_dir() && !hidden {
                self.check_symlink(&path)?;
                module_dirs.push(path);
            }
        }

        // Sort for deterministic discovery order
        module_dirs.sort();

        module_dirs
            .iter()
            .map(|dir| self.load_module(dir))
            .collect()
    }
}

/// Modules registered explicitly in code
#[derive(Default)]
pub struct StaticSource {
    modules: Vec<ModuleDescriptor>,
}

impl StaticSource {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self { modules }
    }

    pub fn register(&mut self, module: ModuleDescriptor) -> &mut Self {
        self.modules.push(module);
        self
    }
}

impl ModuleSource for StaticSource {
    fn describe(&self) -> String {
        format!("{} registered modules", self.modules.len())
    }

    fn load_modules(&self) -> Result<Vec<ModuleDescriptor>> {
        Ok(self.modules.clone())
    }
}
