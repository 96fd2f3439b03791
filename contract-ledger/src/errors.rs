use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::models::{ContractId, JobId, ProfileId};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Money-moving operation that owns a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Deposit,
    Payment,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Deposit => f.write_str("Deposit"),
            TransferKind::Payment => f.write_str("Payment"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inappropriate userId provided")]
    InvalidUserId,

    #[error("An amount property was not passed")]
    MissingAmount,

    #[error("You cannot deposit to your own account")]
    SelfDeposit,

    #[error("One of the required date params are missing: start, end")]
    MissingDateRange,

    #[error("Invalid user")]
    Unauthorized,

    #[error("Invalid user or user is not a client")]
    NotAClient,

    #[error("A profile type is not allowed: {0}")]
    ForbiddenProfileType(String),

    #[error("A contract doesn't exist: {0}")]
    ContractNotFound(ContractId),

    #[error("A profile doesn't own a listed contract: {0}")]
    ContractForbidden(ContractId),

    #[error("Job {0} is not found or is already paid or you're not allowed to see it")]
    JobNotPayable(JobId),

    #[error("User {0} either doesn't exist or is not a client")]
    PayeeNotFound(ProfileId),

    #[error("You cannot deposit more than 25% of your current balance. Deposit amount: {amount}, Current balance: {balance}")]
    DepositCapExceeded { amount: Decimal, balance: Decimal },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("{0} failed")]
    TransactionFailed(TransferKind),
}

impl ResponseError for LedgerError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.public_message();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::InvalidUserId => StatusCode::BAD_REQUEST,
            LedgerError::MissingAmount => StatusCode::BAD_REQUEST,
            LedgerError::SelfDeposit => StatusCode::BAD_REQUEST,
            LedgerError::MissingDateRange => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized => StatusCode::UNAUTHORIZED,
            LedgerError::NotAClient => StatusCode::UNAUTHORIZED,
            LedgerError::ForbiddenProfileType(_) => StatusCode::FORBIDDEN,
            LedgerError::ContractNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::ContractForbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::JobNotPayable(_) => StatusCode::NOT_FOUND,
            LedgerError::PayeeNotFound(_) => StatusCode::BAD_REQUEST,
            LedgerError::DepositCapExceeded { .. } => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            LedgerError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl LedgerError {
    /// Stable classification exposed to API clients
    pub fn error_type(&self) -> &'static str {
        match self {
            LedgerError::Database(_) => "database_error",
            LedgerError::Migration(_) => "database_error",
            LedgerError::Storage(_) => "storage_error",
            LedgerError::Validation(_) => "validation_error",
            LedgerError::InvalidUserId => "validation_error",
            LedgerError::MissingAmount => "validation_error",
            LedgerError::SelfDeposit => "self_deposit",
            LedgerError::MissingDateRange => "validation_error",
            LedgerError::Unauthorized => "unauthorized",
            LedgerError::NotAClient => "unauthorized",
            LedgerError::ForbiddenProfileType(_) => "forbidden",
            LedgerError::ContractNotFound(_) => "not_found",
            LedgerError::ContractForbidden(_) => "forbidden",
            LedgerError::JobNotPayable(_) => "job_not_payable",
            LedgerError::PayeeNotFound(_) => "payee_not_found",
            LedgerError::DepositCapExceeded { .. } => "deposit_cap_exceeded",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::TransactionFailed(_) => "transaction_failed",
        }
    }

    /// Message safe to return to callers. Backend failures never leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::Database(_)
            | LedgerError::Migration(_)
            | LedgerError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
