//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use contract_ledger::config::ReportingConfig;
use contract_ledger::models::{Contract, ContractStatus, Job, Profile, ProfileId, ProfileType};
use contract_ledger::transfer::TransferEngine;
use contract_ledger::{LedgerService, LedgerStore, MemoryLedgerStore};
use rust_decimal::Decimal;
use std::sync::Arc;

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn profile(id: ProfileId, profession: &str, balance: Decimal, kind: ProfileType) -> Profile {
    let now = Utc::now();
    Profile {
        id,
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id),
        profession: profession.to_string(),
        kind,
        balance,
        created_at: now,
        updated_at: now,
    }
}

pub fn client(id: ProfileId, balance: Decimal) -> Profile {
    profile(id, "Buyer", balance, ProfileType::Client)
}

pub fn contractor(id: ProfileId, profession: &str, balance: Decimal) -> Profile {
    profile(id, profession, balance, ProfileType::Contractor)
}

pub fn contract(id: i64, client_id: ProfileId, contractor_id: ProfileId, status: ContractStatus) -> Contract {
    let now = Utc::now();
    Contract {
        id,
        terms: format!("terms {}", id),
        status,
        client_id,
        contractor_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn job(id: i64, contract_id: i64, price: Decimal, paid_at: Option<DateTime<Utc>>) -> Job {
    let now = Utc::now();
    Job {
        id,
        description: format!("job {}", id),
        price,
        paid: paid_at.is_some(),
        payment_date: paid_at,
        contract_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn store_with(profiles: Vec<Profile>, contracts: Vec<Contract>, jobs: Vec<Job>) -> MemoryLedgerStore {
    let store = MemoryLedgerStore::new();
    profiles.into_iter().for_each(|p| store.insert_profile(p));
    contracts.into_iter().for_each(|c| store.insert_contract(c));
    jobs.into_iter().for_each(|j| store.insert_job(j));
    store
}

pub fn engine(store: &MemoryLedgerStore) -> Arc<TransferEngine> {
    Arc::new(TransferEngine::new(Arc::new(store.clone())))
}

pub fn service(store: &MemoryLedgerStore) -> LedgerService {
    LedgerService::new(Arc::new(store.clone()), &ReportingConfig::default())
}

pub async fn balance(store: &MemoryLedgerStore, id: ProfileId) -> Decimal {
    store.get_profile(id).await.unwrap().unwrap().balance
}

pub fn stored_job(store: &MemoryLedgerStore, id: i64) -> Job {
    store.job(id).unwrap()
}

pub async fn status(store: &MemoryLedgerStore, contract_id: i64) -> ContractStatus {
    store.get_contract(contract_id).await.unwrap().unwrap().status
}
