use crate::constants::TENANT_URL_PLACEHOLDER;
use crate::db::connection::mask_url_password;
use crate::error::{InstallError, InstallResult};
use crate::tenancy::directory::{TenantDirectory, TenantRecord};
use crate::tenancy::target::InstallationTarget;
use anyhow::anyhow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Which tenants an operation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantSelector {
    One(String),
    Many(Vec<String>),
    All,
}

impl TenantSelector {
    /// Build a selector from CLI flags; `None` when neither was given
    pub fn from_flags(tenants: &[String], all_tenants: bool) -> Option<Self> {
        if all_tenants {
            Some(Self::All)
        } else {
            match tenants {
                [] => None,
                [one] => Some(Self::One(one.clone())),
                many => Some(Self::Many(many.to_vec())),
            }
        }
    }
}

/// Maps tenant ids and the landlord to concrete installation targets
#[derive(Clone)]
pub struct TargetResolver {
    landlord_url: String,
    tenant_url_template: Option<String>,
    directory: Arc<dyn TenantDirectory>,
}

impl TargetResolver {
    pub fn new(
        landlord_url: impl Into<String>,
        tenant_url_template: Option<String>,
        directory: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            landlord_url: landlord_url.into(),
            tenant_url_template,
            directory,
        }
    }

    pub fn resolve_landlord(&self) -> InstallationTarget {
        InstallationTarget::landlord(&self.landlord_url)
    }

    /// Tenant targets for `selector`, sorted by tenant id
    pub async fn resolve_tenants(
        &self,
        selector: &TenantSelector,
    ) -> InstallResult<Vec<InstallationTarget>> {
        let known: BTreeMap<String, TenantRecord> = self
            .directory
            .tenants()
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let requested: BTreeSet<&str> = match selector {
            TenantSelector::All => known.keys().map(String::as_str).collect(),
            TenantSelector::One(id) => BTreeSet::from([id.as_str()]),
            TenantSelector::Many(ids) => ids.iter().map(String::as_str).collect(),
        };

        let mut targets = Vec::with_capacity(requested.len());
        for id in requested {
            let record = known
                .get(id)
                .ok_or_else(|| InstallError::UnknownTenant(id.to_string()))?;
            targets.push(self.target_for(record)?);
        }

        debug!("Resolved {} tenant targets", targets.len());
        Ok(targets)
    }

    fn target_for(&self, record: &TenantRecord) -> InstallResult<InstallationTarget> {
        let url = match (&record.database_url, &self.tenant_url_template) {
            (Some(url), _) => url.clone(),
            (None, Some(template)) => template.replace(TENANT_URL_PLACEHOLDER, &record.id),
            (None, None) => {
                return Err(anyhow!(
                    "Tenant '{}' has no database URL and no tenant_url_template is configured",
                    record.id
                )
                .into());
            }
        };

        debug!("Tenant '{}' -> {}", record.id, mask_url_password(&url));
        Ok(InstallationTarget::tenant(&record.id, url))
    }
}
