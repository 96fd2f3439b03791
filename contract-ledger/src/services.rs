use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ReportingConfig;
use crate::database::LedgerStore;
use crate::errors::{LedgerError, Result};
use crate::models::{
    ClientPayout, Contract, ContractId, DepositReceipt, DepositRequest, Job, JobId, Profile,
    ProfessionRevenue, ReportQuery,
};
use crate::reporting::ReportingEngine;
use crate::transfer::TransferEngine;

/// Entry point used by the HTTP layer
pub struct LedgerService {
    pub store: Arc<dyn LedgerStore>,
    pub transfers: TransferEngine,
    pub reports: ReportingEngine,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, reporting: &ReportingConfig) -> Self {
        let transfers = TransferEngine::new(store.clone());
        let reports =
            ReportingEngine::new(store.clone(), reporting.default_limit, reporting.max_limit);

        LedgerService {
            store,
            transfers,
            reports,
        }
    }

    /// Resolve the caller from the `profile_id` header value
    pub async fn resolve_profile(&self, profile_id: Option<&str>) -> Result<Profile> {
        let id = profile_id
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .ok_or(LedgerError::Unauthorized)?;

        self.store
            .get_profile(id)
            .await?
            .ok_or(LedgerError::Unauthorized)
    }

    /// Resolve the caller and require a client profile
    pub async fn resolve_client(&self, profile_id: Option<&str>) -> Result<Profile> {
        match self.resolve_profile(profile_id).await {
            Ok(profile) if profile.is_client() => Ok(profile),
            Ok(_) | Err(LedgerError::Unauthorized) | Err(LedgerError::ForbiddenProfileType(_)) => {
                Err(LedgerError::NotAClient)
            }
            Err(e) => Err(e),
        }
    }

    /// Deposit into another client's balance
    pub async fn deposit(
        &self,
        payer: &Profile,
        user_id: &str,
        request: DepositRequest,
    ) -> Result<DepositReceipt> {
        let payee_id = user_id
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or(LedgerError::InvalidUserId)?;
        let amount = request.amount.ok_or(LedgerError::MissingAmount)?;

        info!(
            "Deposit requested: {} from profile {} to profile {}",
            amount, payer.id, payee_id
        );
        self.transfers.deposit(payer.id, payee_id, amount).await
    }

    /// Pay one of the client's jobs
    pub async fn pay_job(&self, client: &Profile, job_id: JobId) -> Result<Job> {
        info!("Payment requested for job {} by profile {}", job_id, client.id);
        self.transfers.pay_job(client.id, job_id).await
    }

    /// Non-terminated contracts the profile is a party to
    pub async fn list_contracts(&self, profile: &Profile) -> Result<Vec<Contract>> {
        self.store.active_contracts_for(profile.id).await
    }

    /// A single contract, only if the profile is a party to it
    pub async fn get_contract(&self, profile: &Profile, contract_id: ContractId) -> Result<Contract> {
        let contract = self
            .store
            .get_contract(contract_id)
            .await?
            .ok_or(LedgerError::ContractNotFound(contract_id))?;

        if !contract.is_party(profile.id) {
            warn!(
                "Profile {} requested contract {} it is not a party to",
                profile.id, contract_id
            );
            return Err(LedgerError::ContractForbidden(contract_id));
        }
        Ok(contract)
    }

    /// Unpaid jobs on the profile's active contracts
    pub async fn list_unpaid_jobs(&self, profile: &Profile) -> Result<Vec<Job>> {
        self.store.unpaid_jobs_for(profile.id).await
    }

    pub async fn best_professions(&self, query: &ReportQuery) -> Result<Vec<ProfessionRevenue>> {
        self.reports.best_professions(query).await
    }

    pub async fn best_clients(&self, query: &ReportQuery) -> Result<Vec<ClientPayout>> {
        self.reports.best_clients(query).await
    }
}
