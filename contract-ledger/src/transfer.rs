//! Balance transfers: client deposits and job payments.
//!
//! # Invariants
//!
//! - Every transfer debits one profile and credits another by the same amount
//! - All writes of a transfer commit together or not at all
//! - A balance is only read for a decision while its row lock is held
//! - A job is paid at most once

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::database::{LedgerStore, LedgerTx};
use crate::errors::{LedgerError, Result, TransferKind};
use crate::lifecycle;
use crate::metrics;
use crate::models::{DepositReceipt, Job, JobId, PayableJob, ProfileId};

/// Largest share of the payer's balance a single deposit may move (25%)
pub const DEPOSIT_CAP_RATIO: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Decimal places of a stored balance (`NUMERIC(12, 2)`)
pub const MONEY_SCALE: u32 = 2;

pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        TransferEngine { store }
    }

    /// Move `amount` from the payer's balance to another client's balance
    pub async fn deposit(
        &self,
        payer_id: ProfileId,
        payee_id: ProfileId,
        amount: Decimal,
    ) -> Result<DepositReceipt> {
        if amount <= Decimal::ZERO {
            return Err(reject(
                TransferKind::Deposit,
                LedgerError::Validation("Deposit amount must be positive".to_string()),
            ));
        }
        // both legs must be representable without rounding
        let amount = amount.normalize();
        if amount.scale() > MONEY_SCALE {
            return Err(reject(
                TransferKind::Deposit,
                LedgerError::Validation(format!(
                    "Deposit amount must have at most {} decimal places",
                    MONEY_SCALE
                )),
            ));
        }
        if payer_id == payee_id {
            return Err(reject(TransferKind::Deposit, LedgerError::SelfDeposit));
        }

        let mut tx = self.begin(TransferKind::Deposit).await?;
        let outcome = execute_deposit(tx.as_mut(), payer_id, payee_id, amount).await;
        let receipt = finish(TransferKind::Deposit, tx, outcome).await?;

        metrics::record_transfer(TransferKind::Deposit, amount);
        info!(
            "Deposit of {} from profile {} to profile {} committed",
            amount, payer_id, payee_id
        );
        Ok(receipt)
    }

    /// Pay a job from the client's balance to the contractor's balance
    pub async fn pay_job(&self, client_id: ProfileId, job_id: JobId) -> Result<Job> {
        let mut tx = self.begin(TransferKind::Payment).await?;
        let outcome = execute_payment(tx.as_mut(), client_id, job_id).await;
        let (job, terminated) = finish(TransferKind::Payment, tx, outcome).await?;

        metrics::record_transfer(TransferKind::Payment, job.price);
        if terminated {
            metrics::CONTRACTS_TERMINATED.inc();
        }
        info!(
            "Job {} paid by profile {} for {} (contract terminated: {})",
            job.id, client_id, job.price, terminated
        );
        Ok(job)
    }

    async fn begin(&self, kind: TransferKind) -> Result<Box<dyn LedgerTx>> {
        self.store.begin().await.map_err(|e| surface(kind, e))
    }
}

async fn execute_deposit(
    tx: &mut dyn LedgerTx,
    payer_id: ProfileId,
    payee_id: ProfileId,
    amount: Decimal,
) -> Result<DepositReceipt> {
    let locked = tx.lock_profiles(&[payer_id, payee_id]).await?;

    let payer = locked
        .iter()
        .find(|p| p.id == payer_id)
        .ok_or(LedgerError::Unauthorized)?;
    if !payer.is_client() {
        return Err(LedgerError::NotAClient);
    }

    if amount > payer.balance * DEPOSIT_CAP_RATIO {
        return Err(LedgerError::DepositCapExceeded {
            amount,
            balance: payer.balance,
        });
    }

    if !locked.iter().any(|p| p.id == payee_id && p.is_client()) {
        return Err(LedgerError::PayeeNotFound(payee_id));
    }

    let payer = tx.adjust_balance(payer_id, -amount).await?;
    let payee = tx.adjust_balance(payee_id, amount).await?;

    Ok(DepositReceipt {
        payer_id,
        payee_id,
        amount,
        payer_balance: payer.balance,
        payee_balance: payee.balance,
    })
}

async fn execute_payment(
    tx: &mut dyn LedgerTx,
    client_id: ProfileId,
    job_id: JobId,
) -> Result<(Job, bool)> {
    let PayableJob { job, contract } = tx
        .lock_payable_job(job_id, client_id)
        .await?
        .ok_or(LedgerError::JobNotPayable(job_id))?;

    let locked = tx.lock_profiles(&[client_id, contract.contractor_id]).await?;
    let client = locked
        .iter()
        .find(|p| p.id == client_id)
        .ok_or(LedgerError::Unauthorized)?;
    if !locked.iter().any(|p| p.id == contract.contractor_id) {
        return Err(LedgerError::Storage(format!(
            "contractor {} of contract {} is missing",
            contract.contractor_id, contract.id
        )));
    }

    if client.balance < job.price {
        return Err(LedgerError::InsufficientFunds {
            required: job.price,
            available: client.balance,
        });
    }

    tx.adjust_balance(client_id, -job.price).await?;
    tx.adjust_balance(contract.contractor_id, job.price).await?;
    let paid = tx.mark_job_paid(job.id, Utc::now()).await?;
    let terminated = lifecycle::apply(tx, &contract).await?;

    Ok((paid, terminated.is_some()))
}

/// Commit on success, roll back on failure
async fn finish<T>(kind: TransferKind, tx: Box<dyn LedgerTx>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| surface(kind, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("{} rollback reported an error: {}", kind, rollback_err);
            }
            Err(surface(kind, err))
        }
    }
}

/// Collapse backend failures into a single transaction failure; pass rejections through
fn surface(kind: TransferKind, err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Database(_)
        | LedgerError::Migration(_)
        | LedgerError::Storage(_) => {
            error!("{} transaction rolled back: {}", kind, err);
            metrics::record_outcome(kind, "failed");
            LedgerError::TransactionFailed(kind)
        }
        other => reject(kind, other),
    }
}

fn reject(kind: TransferKind, err: LedgerError) -> LedgerError {
    warn!("{} rejected: {}", kind, err);
    metrics::record_outcome(kind, err.error_type());
    err
}
