//! Contract Ledger
//!
//! Client balances, contractor payouts and earnings reports for a
//! client/contractor jobs marketplace.
//!
//! # Architecture
//!
//! - **Store**: profiles, contracts and jobs behind a transactional API with row locks
//! - **Transfers**: deposits and job payments as single atomic transactions
//! - **Lifecycle**: contracts terminate when their last job is paid
//! - **Reporting**: read-only rankings over paid jobs in a time window
//!
//! # Invariants
//!
//! - Money conservation: every transfer debits and credits the same amount
//! - A job is paid at most once
//! - A terminated contract never changes again

pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod reporting;
pub mod services;
pub mod transfer;

pub use config::Config;
pub use database::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore};
pub use errors::{LedgerError, Result, TransferKind};
pub use services::LedgerService;
