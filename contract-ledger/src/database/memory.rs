//! In-process ledger store.
//!
//! Committed rows live behind a single `RwLock` that is only held for the
//! duration of a synchronous read or an apply step. Row locks are separate
//! async mutexes keyed by table and id, held by a transaction until it ends.
//! Writes are staged inside the transaction and applied on commit while the
//! row locks are still held.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{LedgerStore, LedgerTx};
use crate::errors::{LedgerError, Result};
use crate::models::{
    ClientPayout, Contract, ContractId, ContractStatus, Job, JobId, PayableJob, Profile,
    ProfileId, ProfessionRevenue,
};
use crate::reporting::ReportWindow;

#[derive(Debug, Default)]
struct Tables {
    profiles: BTreeMap<ProfileId, Profile>,
    contracts: BTreeMap<ContractId, Contract>,
    jobs: BTreeMap<JobId, Job>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Contract(ContractId),
    Job(JobId),
    Profile(ProfileId),
}

#[derive(Default)]
struct RowLocks {
    rows: DashMap<RowKey, Arc<Mutex<()>>>,
}

impl RowLocks {
    async fn acquire(&self, key: RowKey) -> OwnedMutexGuard<()> {
        let row = Arc::clone(&*self.rows.entry(key).or_default());
        row.lock_owned().await
    }
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    locks: RowLocks,
    fail_next_commit: AtomicBool,
}

/// Ledger store kept entirely in memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.shared.tables.write().profiles.insert(profile.id, profile);
    }

    pub fn insert_contract(&self, contract: Contract) {
        self.shared.tables.write().contracts.insert(contract.id, contract);
    }

    pub fn insert_job(&self, job: Job) {
        self.shared.tables.write().jobs.insert(job.id, job);
    }

    /// Make the next commit fail as if the backend had lost the transaction
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Sum of every profile balance
    pub fn total_balance(&self) -> Decimal {
        self.shared
            .tables
            .read()
            .profiles
            .values()
            .map(|p| p.balance)
            .sum()
    }

    /// Committed state of a job
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.shared.tables.read().jobs.get(&id).cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryTx::new(Arc::clone(&self.shared))))
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        Ok(self.shared.tables.read().profiles.get(&id).cloned())
    }

    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        Ok(self.shared.tables.read().contracts.get(&id).cloned())
    }

    async fn active_contracts_for(&self, profile_id: ProfileId) -> Result<Vec<Contract>> {
        let tables = self.shared.tables.read();
        Ok(tables
            .contracts
            .values()
            .filter(|c| c.is_party(profile_id) && c.is_active())
            .cloned()
            .collect())
    }

    async fn unpaid_jobs_for(&self, profile_id: ProfileId) -> Result<Vec<Job>> {
        let tables = self.shared.tables.read();
        let contract_ids: HashSet<ContractId> = tables
            .contracts
            .values()
            .filter(|c| c.is_party(profile_id) && c.is_active())
            .map(|c| c.id)
            .collect();

        Ok(tables
            .jobs
            .values()
            .filter(|j| !j.paid && contract_ids.contains(&j.contract_id))
            .cloned()
            .collect())
    }

    async fn revenue_by_profession(
        &self,
        window: &ReportWindow,
        limit: u32,
    ) -> Result<Vec<ProfessionRevenue>> {
        let tables = self.shared.tables.read();
        let mut totals: HashMap<String, Decimal> = HashMap::new();

        for (job, contract) in paid_jobs_in(&tables, window) {
            if contract.status == ContractStatus::New {
                continue;
            }
            let Some(contractor) = tables.profiles.get(&contract.contractor_id) else {
                continue;
            };
            *totals.entry(contractor.profession.clone()).or_default() += job.price;
        }

        let mut ranked: Vec<ProfessionRevenue> = totals
            .into_iter()
            .map(|(profession, total_revenue)| ProfessionRevenue {
                profession,
                total_revenue,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.profession.cmp(&b.profession))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn payouts_by_client(
        &self,
        window: &ReportWindow,
        limit: u32,
    ) -> Result<Vec<ClientPayout>> {
        let tables = self.shared.tables.read();
        let mut totals: BTreeMap<ProfileId, Decimal> = BTreeMap::new();

        for (job, contract) in paid_jobs_in(&tables, window) {
            *totals.entry(contract.client_id).or_default() += job.price;
        }

        let mut ranked: Vec<ClientPayout> = totals
            .into_iter()
            .filter_map(|(client_id, total_paid)| {
                tables.profiles.get(&client_id).map(|client| ClientPayout {
                    client_id,
                    full_name: client.full_name(),
                    total_paid,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_paid
                .cmp(&a.total_paid)
                .then_with(|| a.client_id.cmp(&b.client_id))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

fn paid_jobs_in<'a>(
    tables: &'a Tables,
    window: &'a ReportWindow,
) -> impl Iterator<Item = (&'a Job, &'a Contract)> + 'a {
    tables
        .jobs
        .values()
        .filter(move |j| j.paid && j.payment_date.map_or(false, |at| window.contains(at)))
        .filter_map(move |j| tables.contracts.get(&j.contract_id).map(|c| (j, c)))
}

struct MemoryTx {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    profiles: HashMap<ProfileId, Profile>,
    contracts: HashMap<ContractId, Contract>,
    jobs: HashMap<JobId, Job>,
}

impl MemoryTx {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            held: HashMap::new(),
            profiles: HashMap::new(),
            contracts: HashMap::new(),
            jobs: HashMap::new(),
        }
    }

    async fn lock(&mut self, key: RowKey) {
        if !self.held.contains_key(&key) {
            let guard = self.shared.locks.acquire(key).await;
            self.held.insert(key, guard);
        }
    }

    fn require_lock(&self, key: RowKey) -> Result<()> {
        if self.held.contains_key(&key) {
            Ok(())
        } else {
            Err(LedgerError::Storage(format!(
                "{:?} is not locked by this transaction",
                key
            )))
        }
    }

    fn profile(&self, id: ProfileId) -> Option<Profile> {
        self.profiles
            .get(&id)
            .cloned()
            .or_else(|| self.shared.tables.read().profiles.get(&id).cloned())
    }

    fn contract(&self, id: ContractId) -> Option<Contract> {
        self.contracts
            .get(&id)
            .cloned()
            .or_else(|| self.shared.tables.read().contracts.get(&id).cloned())
    }

    fn job(&self, id: JobId) -> Option<Job> {
        self.jobs
            .get(&id)
            .cloned()
            .or_else(|| self.shared.tables.read().jobs.get(&id).cloned())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_profiles(&mut self, ids: &[ProfileId]) -> Result<Vec<Profile>> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut locked = Vec::with_capacity(ordered.len());
        for id in ordered {
            if self.profile(id).is_none() {
                continue;
            }
            self.lock(RowKey::Profile(id)).await;
            if let Some(profile) = self.profile(id) {
                locked.push(profile);
            }
        }
        Ok(locked)
    }

    async fn adjust_balance(&mut self, id: ProfileId, delta: Decimal) -> Result<Profile> {
        self.require_lock(RowKey::Profile(id))?;
        let mut profile = self
            .profile(id)
            .ok_or_else(|| LedgerError::Storage(format!("profile {} vanished", id)))?;
        profile.balance += delta;
        profile.updated_at = Utc::now();
        self.profiles.insert(id, profile.clone());
        Ok(profile)
    }

    async fn lock_payable_job(
        &mut self,
        job_id: JobId,
        client_id: ProfileId,
    ) -> Result<Option<PayableJob>> {
        // contract_id never changes, so it can be read before any lock is taken
        let Some(contract_id) = self.job(job_id).map(|j| j.contract_id) else {
            return Ok(None);
        };

        self.lock(RowKey::Contract(contract_id)).await;
        self.lock(RowKey::Job(job_id)).await;

        let (Some(job), Some(contract)) = (self.job(job_id), self.contract(contract_id)) else {
            return Ok(None);
        };
        if job.paid
            || contract.client_id != client_id
            || contract.status != ContractStatus::InProgress
        {
            debug!("job {} is not payable by profile {}", job_id, client_id);
            return Ok(None);
        }

        Ok(Some(PayableJob { job, contract }))
    }

    async fn mark_job_paid(&mut self, job_id: JobId, paid_at: DateTime<Utc>) -> Result<Job> {
        self.require_lock(RowKey::Job(job_id))?;
        let mut job = self
            .job(job_id)
            .filter(|j| !j.paid)
            .ok_or(LedgerError::JobNotPayable(job_id))?;
        job.paid = true;
        job.payment_date = Some(paid_at);
        job.updated_at = paid_at;
        self.jobs.insert(job_id, job.clone());
        Ok(job)
    }

    async fn jobs_for_contract(&mut self, contract_id: ContractId) -> Result<Vec<Job>> {
        self.require_lock(RowKey::Contract(contract_id))?;
        let committed: Vec<Job> = self
            .shared
            .tables
            .read()
            .jobs
            .values()
            .filter(|j| j.contract_id == contract_id)
            .cloned()
            .collect();

        Ok(committed
            .into_iter()
            .map(|j| self.jobs.get(&j.id).cloned().unwrap_or(j))
            .collect())
    }

    async fn set_contract_status(
        &mut self,
        contract_id: ContractId,
        status: ContractStatus,
    ) -> Result<Contract> {
        self.require_lock(RowKey::Contract(contract_id))?;
        let mut contract = self
            .contract(contract_id)
            .ok_or_else(|| LedgerError::Storage(format!("contract {} vanished", contract_id)))?;
        contract.status = status;
        contract.updated_at = Utc::now();
        self.contracts.insert(contract_id, contract.clone());
        Ok(contract)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            shared,
            held,
            profiles,
            contracts,
            jobs,
        } = *self;

        if shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage("commit rejected by store".to_string()));
        }

        {
            let mut tables = shared.tables.write();
            tables.profiles.extend(profiles);
            tables.contracts.extend(contracts);
            tables.jobs.extend(jobs);
        }

        // row locks are released only after the writes are visible
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileType;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn profile(id: ProfileId, balance: Decimal) -> Profile {
        let now = Utc::now();
        Profile {
            id,
            first_name: format!("First{}", id),
            last_name: format!("Last{}", id),
            profession: "Tester".to_string(),
            kind: ProfileType::Client,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryLedgerStore::new();
        store.insert_profile(profile(1, dec!(10)));

        let mut tx = store.begin().await.unwrap();
        tx.lock_profiles(&[1]).await.unwrap();
        tx.adjust_balance(1, dec!(-4)).await.unwrap();
        drop(tx);

        let stored = store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(10));
    }

    #[tokio::test]
    async fn test_adjust_requires_lock() {
        let store = MemoryLedgerStore::new();
        store.insert_profile(profile(1, dec!(10)));

        let mut tx = store.begin().await.unwrap();
        let err = tx.adjust_balance(1, dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction_until_commit() {
        let store = MemoryLedgerStore::new();
        store.insert_profile(profile(1, dec!(10)));

        let mut first = store.begin().await.unwrap();
        first.lock_profiles(&[1]).await.unwrap();
        first.adjust_balance(1, dec!(5)).await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            let locked = second.lock_profiles(&[1]).await.unwrap();
            locked[0].balance
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.commit().await.unwrap();
        assert_eq!(waiter.await.unwrap(), dec!(15));
    }

    #[tokio::test]
    async fn test_lock_profiles_skips_missing_rows() {
        let store = MemoryLedgerStore::new();
        store.insert_profile(profile(2, dec!(1)));
        store.insert_profile(profile(1, dec!(1)));

        let mut tx = store.begin().await.unwrap();
        let locked = tx.lock_profiles(&[2, 99, 1, 2]).await.unwrap();
        let ids: Vec<ProfileId> = locked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_injected_commit_failure_leaves_rows_untouched() {
        let store = MemoryLedgerStore::new();
        store.insert_profile(profile(1, dec!(10)));
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.lock_profiles(&[1]).await.unwrap();
        tx.adjust_balance(1, dec!(3)).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.total_balance(), dec!(10));
    }
}
