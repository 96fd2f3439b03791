//! Ledger store: persisted profiles, contracts and jobs.
//!
//! Reads outside a transaction never lock. Every mutation happens through a
//! [`LedgerTx`], which holds exclusive row locks from the moment a row is
//! locked until the transaction is committed or dropped. Dropping a
//! transaction without calling [`LedgerTx::commit`] rolls it back.
//!
//! Lock order is contract, then job, then profiles in ascending id order.
//! Callers that follow it cannot deadlock each other.

mod memory;
mod postgres;
pub mod seed;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::Result;
use crate::models::{
    ClientPayout, Contract, ContractId, ContractStatus, Job, JobId, PayableJob, Profile,
    ProfileId, ProfessionRevenue,
};
use crate::reporting::ReportWindow;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction scoped to a single ledger operation
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>>;

    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>>;

    /// Non-terminated contracts where the profile is client or contractor, by id
    async fn active_contracts_for(&self, profile_id: ProfileId) -> Result<Vec<Contract>>;

    /// Unpaid jobs on the profile's non-terminated contracts, by id
    async fn unpaid_jobs_for(&self, profile_id: ProfileId) -> Result<Vec<Job>>;

    /// Paid job revenue per contractor profession, excluding `new` contracts
    async fn revenue_by_profession(
        &self,
        window: &ReportWindow,
        limit: u32,
    ) -> Result<Vec<ProfessionRevenue>>;

    /// Paid job totals per client
    async fn payouts_by_client(&self, window: &ReportWindow, limit: u32)
        -> Result<Vec<ClientPayout>>;
}

/// A single open transaction.
///
/// Methods that take a lock say so; the lock lasts until the transaction ends.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the given profiles exclusively, in ascending id order.
    ///
    /// Returns the profiles that exist, sorted by id.
    async fn lock_profiles(&mut self, ids: &[ProfileId]) -> Result<Vec<Profile>>;

    /// Add `delta` to a balance. The profile must already be locked by this transaction.
    async fn adjust_balance(&mut self, id: ProfileId, delta: Decimal) -> Result<Profile>;

    /// Lock a job and its contract if the job is unpaid, the contract is
    /// `in_progress` and `client_id` is the contract's client.
    ///
    /// The contract lock is taken before the job lock, and the payability
    /// checks run against the locked rows. Returns `None` when the job is
    /// not payable.
    async fn lock_payable_job(
        &mut self,
        job_id: JobId,
        client_id: ProfileId,
    ) -> Result<Option<PayableJob>>;

    /// Mark a locked job as paid
    async fn mark_job_paid(&mut self, job_id: JobId, paid_at: DateTime<Utc>) -> Result<Job>;

    /// Every job of a contract, including writes staged by this transaction.
    /// The contract must already be locked by this transaction.
    async fn jobs_for_contract(&mut self, contract_id: ContractId) -> Result<Vec<Job>>;

    /// Update the status of a locked contract
    async fn set_contract_status(
        &mut self,
        contract_id: ContractId,
        status: ContractStatus,
    ) -> Result<Contract>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
