use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::errors::LedgerError;

pub type ProfileId = i64;
pub type ContractId = i64;
pub type JobId = i64;

/// Profile type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Client,     // Funds contracts and pays for jobs
    Contractor, // Performs jobs and receives payment
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Client => "client",
            ProfileType::Contractor => "contractor",
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(ProfileType::Client),
            "contractor" => Ok(ProfileType::Contractor),
            other => Err(LedgerError::ForbiddenProfileType(other.to_string())),
        }
    }
}

/// A client or contractor account holding a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub profession: String,
    #[serde(rename = "type")]
    pub kind: ProfileType,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_client(&self) -> bool {
        self.kind == ProfileType::Client
    }
}

/// Contract status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    New,        // Signed but no work started
    InProgress, // Jobs may be paid
    Terminated, // All jobs paid, immutable from here on
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::New => "new",
            ContractStatus::InProgress => "in_progress",
            ContractStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ContractStatus::New),
            "in_progress" => Ok(ContractStatus::InProgress),
            "terminated" => Ok(ContractStatus::Terminated),
            other => Err(LedgerError::Storage(format!("unknown contract status '{}'", other))),
        }
    }
}

/// Agreement between one client and one contractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub terms: String,
    pub status: ContractStatus,
    pub client_id: ProfileId,
    pub contractor_id: ProfileId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// True when the profile is either side of the contract
    pub fn is_party(&self, profile_id: ProfileId) -> bool {
        self.client_id == profile_id || self.contractor_id == profile_id
    }

    pub fn is_active(&self) -> bool {
        self.status != ContractStatus::Terminated
    }
}

/// Billable unit of work under a contract.
///
/// `paid` and `payment_date` move together: a job is paid exactly when it
/// carries a payment date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: JobId,
    pub description: String,
    pub price: Decimal,
    pub paid: bool,
    pub payment_date: Option<DateTime<Utc>>,
    pub contract_id: ContractId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job locked for payment together with its contract
#[derive(Debug, Clone)]
pub struct PayableJob {
    pub job: Job,
    pub contract: Contract,
}

/// Deposit request body
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DepositRequest {
    pub amount: Option<Decimal>,
}

/// Outcome of a successful deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub payer_id: ProfileId,
    pub payee_id: ProfileId,
    pub amount: Decimal,
    pub payer_balance: Decimal,
    pub payee_balance: Decimal,
}

/// Query parameters shared by the admin reports
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<String>, // Parsed after the date window
}

/// Revenue earned by a profession in a report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProfessionRevenue {
    pub profession: String,
    pub total_revenue: Decimal,
}

/// Amount paid by a client in a report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClientPayout {
    pub client_id: ProfileId,
    pub full_name: String,
    pub total_paid: Decimal,
}
