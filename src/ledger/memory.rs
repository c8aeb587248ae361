use crate::error::{InstallError, InstallResult};
use crate::ledger::{Ledger, LedgerEntry, LedgerLock};
use crate::tenancy::InstallationTarget;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

type LockKey = (String, String);

/// In-process ledger for tests and embedding callers
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    locks: Arc<Mutex<HashSet<LockKey>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in the order it was recorded
    pub fn entries(&self) -> Vec<LedgerEntry> {
        lock_ignoring_poison(&self.entries).clone()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn applied_units(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Vec<LedgerEntry>> {
        let key = target.key();
        let mut applied: Vec<LedgerEntry> = lock_ignoring_poison(&self.entries)
            .iter()
            .filter(|e| e.module == module && e.target_key == key)
            .cloned()
            .collect();
        applied.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(applied)
    }

    async fn record(&self, entry: &LedgerEntry) -> InstallResult<()> {
        let mut entries = lock_ignoring_poison(&self.entries);
        let duplicate = entries.iter().any(|e| {
            e.module == entry.module && e.target_key == entry.target_key && e.unit_id == entry.unit_id
        });

        if duplicate {
            return Err(InstallError::DuplicateApplication {
                module: entry.module.clone(),
                target: entry.target_key.clone(),
                unit_id: entry.unit_id.clone(),
            });
        }

        entries.push(entry.clone());
        Ok(())
    }

    async fn try_lock(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Option<Box<dyn LedgerLock>>> {
        let key = (module.to_string(), target.key());
        if !lock_ignoring_poison(&self.locks).insert(key.clone()) {
            return Ok(None);
        }

        Ok(Some(Box::new(MemoryLock {
            locks: Arc::clone(&self.locks),
            key: Some(key),
        })))
    }
}

struct MemoryLock {
    locks: Arc<Mutex<HashSet<LockKey>>>,
    key: Option<LockKey>,
}

impl MemoryLock {
    fn unlock(&mut self) {
        if let Some(key) = self.key.take() {
            lock_ignoring_poison(&self.locks).remove(&key);
        }
    }
}

#[async_trait]
impl LedgerLock for MemoryLock {
    async fn release(&mut self) -> Result<()> {
        self.unlock();
        Ok(())
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
