//! Prometheus metrics for the ledger.
//!
//! - `ledger_transfers_total{kind, outcome}` - deposits and job payments by outcome
//! - `ledger_transfer_amount{kind}` - distribution of committed transfer amounts
//! - `ledger_contracts_terminated_total` - contracts closed by their last payment
//! - `ledger_reports_total{report}` - admin report queries served

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::TransferKind;

lazy_static! {
    pub static ref TRANSFERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_transfers_total",
        "Deposits and job payments by outcome",
        &["kind", "outcome"]
    )
    .expect("metric can be created");

    pub static ref TRANSFER_AMOUNT: HistogramVec = register_histogram_vec!(
        "ledger_transfer_amount",
        "Distribution of committed transfer amounts",
        &["kind"],
        vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
    )
    .expect("metric can be created");

    pub static ref CONTRACTS_TERMINATED: IntCounter = register_int_counter!(
        "ledger_contracts_terminated_total",
        "Contracts terminated after their last job was paid"
    )
    .expect("metric can be created");

    pub static ref REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_reports_total",
        "Admin report queries served",
        &["report"]
    )
    .expect("metric can be created");
}

fn kind_label(kind: TransferKind) -> &'static str {
    match kind {
        TransferKind::Deposit => "deposit",
        TransferKind::Payment => "payment",
    }
}

/// Record a committed transfer
pub fn record_transfer(kind: TransferKind, amount: Decimal) {
    let label = kind_label(kind);
    TRANSFERS_TOTAL.with_label_values(&[label, "committed"]).inc();
    TRANSFER_AMOUNT
        .with_label_values(&[label])
        .observe(amount.to_f64().unwrap_or_default());
}

/// Record a rejected or failed transfer
pub fn record_outcome(kind: TransferKind, outcome: &str) {
    TRANSFERS_TOTAL
        .with_label_values(&[kind_label(kind), outcome])
        .inc();
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
