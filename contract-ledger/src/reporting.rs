//! Admin reports over paid jobs.
//!
//! Both reports are read-only and run outside any transaction. The date
//! window and limit are validated before the store is queried.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::database::LedgerStore;
use crate::errors::{LedgerError, Result};
use crate::metrics;
use crate::models::{ClientPayout, ProfessionRevenue, ReportQuery};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Inclusive payment-date window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(LedgerError::Validation(format!(
                "start ({}) must not be after end ({})",
                start, end
            )));
        }
        Ok(ReportWindow { start, end })
    }

    /// Build a window from raw query values. Both bounds are required.
    ///
    /// A bare date as `end` covers that whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let (Some(start), Some(end)) = (non_blank(start), non_blank(end)) else {
            return Err(LedgerError::MissingDateRange);
        };
        Self::new(parse_instant(start, Bound::Start)?, parse_instant(end, Bound::End)?)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_instant(raw: &str, bound: Bound) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| LedgerError::Validation(format!("Unrecognised date '{}'", raw)))?;
    let naive = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_micro_opt(23, 59, 59, 999_999),
    }
    .ok_or_else(|| LedgerError::Validation(format!("Unrecognised date '{}'", raw)))?;

    Ok(Utc.from_utc_datetime(&naive))
}

pub struct ReportingEngine {
    store: Arc<dyn LedgerStore>,
    default_limit: u32,
    max_limit: u32,
}

impl ReportingEngine {
    pub fn new(store: Arc<dyn LedgerStore>, default_limit: u32, max_limit: u32) -> Self {
        ReportingEngine {
            store,
            default_limit,
            max_limit,
        }
    }

    fn resolve_limit(&self, raw: Option<&str>) -> Result<u32> {
        let limit = match non_blank(raw) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                LedgerError::Validation(format!("limit '{}' is not a positive integer", raw))
            })?,
            None => self.default_limit,
        };
        if limit == 0 || limit > self.max_limit {
            return Err(LedgerError::Validation(format!(
                "limit must be between 1 and {}",
                self.max_limit
            )));
        }
        Ok(limit)
    }

    /// Professions ranked by revenue from paid jobs in the window
    pub async fn best_professions(&self, query: &ReportQuery) -> Result<Vec<ProfessionRevenue>> {
        let window = ReportWindow::parse(query.start.as_deref(), query.end.as_deref())?;
        let limit = self.resolve_limit(query.limit.as_deref())?;

        debug!(
            "best professions between {} and {} (limit {})",
            window.start, window.end, limit
        );
        let ranked = self.store.revenue_by_profession(&window, limit).await?;
        metrics::REPORTS_TOTAL
            .with_label_values(&["best_profession"])
            .inc();
        Ok(ranked)
    }

    /// Clients ranked by the total they paid for jobs in the window
    pub async fn best_clients(&self, query: &ReportQuery) -> Result<Vec<ClientPayout>> {
        let window = ReportWindow::parse(query.start.as_deref(), query.end.as_deref())?;
        let limit = self.resolve_limit(query.limit.as_deref())?;

        debug!(
            "best clients between {} and {} (limit {})",
            window.start, window.end, limit
        );
        let ranked = self.store.payouts_by_client(&window, limit).await?;
        metrics::REPORTS_TOTAL.with_label_values(&["best_clients"]).inc();
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_missing_bounds_rejected() {
        assert!(matches!(
            ReportWindow::parse(Some("2021-01-21 00:00:00.000"), None),
            Err(LedgerError::MissingDateRange)
        ));
        assert!(matches!(
            ReportWindow::parse(None, Some("2021-01-21")),
            Err(LedgerError::MissingDateRange)
        ));
        assert!(matches!(
            ReportWindow::parse(Some("  "), Some("2021-01-21")),
            Err(LedgerError::MissingDateRange)
        ));
    }

    #[test]
    fn test_accepted_formats() {
        let window =
            ReportWindow::parse(Some("2015-01-21 00:00:00.000"), Some("2021-01-21T10:30:00Z"))
                .unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2015, 1, 21, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2021, 1, 21, 10, 30, 0).unwrap());

        let window = ReportWindow::parse(Some("2020-08-15"), Some("2020-08-15")).unwrap();
        assert_eq!(window.start.hour(), 0);
        assert_eq!(window.end.hour(), 23);
        assert!(window.contains(Utc.with_ymd_and_hms(2020, 8, 15, 19, 11, 26).unwrap()));
    }

    #[test]
    fn test_garbage_and_inverted_windows() {
        assert!(matches!(
            ReportWindow::parse(Some("yesterday"), Some("2021-01-01")),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ReportWindow::parse(Some("2021-02-01"), Some("2021-01-01")),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_window_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        let window = ReportWindow::new(start, end).unwrap();
        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
    }
}
