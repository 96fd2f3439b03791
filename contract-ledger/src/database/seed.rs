//! Demo dataset for the in-memory backend.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use super::MemoryLedgerStore;
use crate::models::{Contract, ContractStatus, Job, Profile, ProfileType};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 8, day, hour, 11, 26)
        .single()
        .unwrap_or_default()
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn profile(id: i64, first: &str, last: &str, profession: &str, cents: i64, kind: ProfileType) -> Profile {
    Profile {
        id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        profession: profession.to_string(),
        kind,
        balance: money(cents),
        created_at: at(1, 9),
        updated_at: at(1, 9),
    }
}

fn contract(id: i64, client_id: i64, contractor_id: i64, status: ContractStatus) -> Contract {
    Contract {
        id,
        terms: format!("contract {} terms", id),
        status,
        client_id,
        contractor_id,
        created_at: at(1, 10),
        updated_at: at(1, 10),
    }
}

fn job(id: i64, contract_id: i64, cents: i64, paid_on: Option<u32>) -> Job {
    let payment_date = paid_on.map(|day| at(day, 19));
    Job {
        id,
        description: "work".to_string(),
        price: money(cents),
        paid: payment_date.is_some(),
        payment_date,
        contract_id,
        created_at: at(2, 10),
        updated_at: payment_date.unwrap_or_else(|| at(2, 10)),
    }
}

pub fn profiles() -> Vec<Profile> {
    use ProfileType::{Client, Contractor};
    vec![
        profile(1, "Ada", "Byron", "Mathematician", 115_000, Client),
        profile(2, "Grace", "Hopper", "Admiral", 23_111, Client),
        profile(3, "Ned", "Stark", "Lord", 45_130, Client),
        profile(4, "Misty", "Waters", "Trainer", 130, Client),
        profile(5, "Ringo", "Starr", "Musician", 6_400, Contractor),
        profile(6, "Linus", "Torvalds", "Programmer", 121_400, Contractor),
        profile(7, "Alan", "Turing", "Programmer", 2_200, Contractor),
        profile(8, "Boromir", "Gondor", "Fighter", 31_400, Contractor),
    ]
}

pub fn contracts() -> Vec<Contract> {
    use ContractStatus::{InProgress, New, Terminated};
    vec![
        contract(1, 1, 5, Terminated),
        contract(2, 1, 6, InProgress),
        contract(3, 2, 6, InProgress),
        contract(4, 2, 7, InProgress),
        contract(5, 3, 8, New),
        contract(6, 3, 7, InProgress),
        contract(7, 4, 7, InProgress),
        contract(8, 4, 6, InProgress),
        contract(9, 4, 8, InProgress),
    ]
}

pub fn jobs() -> Vec<Job> {
    vec![
        job(1, 1, 20_000, Some(14)),
        job(2, 2, 20_100, None),
        job(3, 3, 20_200, None),
        job(4, 4, 20_000, None),
        job(5, 7, 20_000, None),
        job(6, 7, 202_000, Some(15)),
        job(7, 2, 20_000, Some(15)),
        job(8, 3, 20_000, Some(15)),
        job(9, 4, 20_000, Some(15)),
        job(10, 5, 2_100, Some(10)),
        job(11, 6, 2_100, Some(15)),
        job(12, 6, 12_100, Some(15)),
        job(13, 6, 12_100, Some(14)),
        job(14, 9, 15_000, None),
        job(15, 6, 5_000, None),
    ]
}

impl MemoryLedgerStore {
    /// A store pre-loaded with the demo dataset
    pub fn seeded() -> Self {
        let store = MemoryLedgerStore::new();
        for p in profiles() {
            store.insert_profile(p);
        }
        for c in contracts() {
            store.insert_contract(c);
        }
        for j in jobs() {
            store.insert_job(j);
        }
        store
    }
}
