//! Contract lifecycle rule.
//!
//! A contract in progress is terminated once every one of its jobs is paid.
//! The rule runs inside the payment transaction, with the contract row locked,
//! so the job set it sees cannot change underneath it.

use tracing::info;

use crate::database::LedgerTx;
use crate::errors::Result;
use crate::models::{Contract, ContractStatus, Job};

/// Status the contract should move to, if any.
///
/// Jobs belonging to other contracts are ignored. Terminated and new
/// contracts never transition here.
pub fn next_status(contract: &Contract, jobs: &[Job]) -> Option<ContractStatus> {
    if contract.status != ContractStatus::InProgress {
        return None;
    }

    let mut own_jobs = jobs.iter().filter(|j| j.contract_id == contract.id).peekable();
    if own_jobs.peek().is_none() {
        return None;
    }

    if own_jobs.all(|j| j.paid) {
        Some(ContractStatus::Terminated)
    } else {
        None
    }
}

/// Evaluate the rule for a locked contract and apply the transition.
///
/// Returns the updated contract when a transition happened.
pub async fn apply(tx: &mut dyn LedgerTx, contract: &Contract) -> Result<Option<Contract>> {
    let jobs = tx.jobs_for_contract(contract.id).await?;

    match next_status(contract, &jobs) {
        Some(status) => {
            let updated = tx.set_contract_status(contract.id, status).await?;
            info!("Contract {} is now {}", contract.id, updated.status);
            Ok(Some(updated))
        }
        None => Ok(None),
    }
}
