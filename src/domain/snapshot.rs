//! Daily portfolio snapshots keyed by market session date.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::portfolio::Valuation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub holdings_value: f64,
    pub total_value: f64,
    pub daily_pnl: f64,
    /// Fractional change against the previous session, e.g. -0.05.
    pub daily_pnl_pct: f64,
    pub recorded_at: DateTime<Utc>,
}

/// The market's calendar date for `now` at a fixed UTC offset.
pub fn session_date(now: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDate {
    (now + Duration::hours(i64::from(utc_offset_hours))).date_naive()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotSeries {
    by_date: BTreeMap<NaiveDate, PortfolioSnapshot>,
}

impl SnapshotSeries {
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = PortfolioSnapshot>) -> Self {
        SnapshotSeries {
            by_date: snapshots.into_iter().map(|s| (s.date, s)).collect(),
        }
    }

    pub fn latest(&self) -> Option<&PortfolioSnapshot> {
        self.by_date.values().next_back()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PortfolioSnapshot> {
        self.by_date.get(&date)
    }

    pub fn previous_before(&self, date: NaiveDate) -> Option<&PortfolioSnapshot> {
        self.by_date.range(..date).next_back().map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortfolioSnapshot> {
        self.by_date.values()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Snapshot for `date`; P&L is measured against the last earlier session.
    pub fn prepare(&self, date: NaiveDate, valuation: &Valuation, at: DateTime<Utc>) -> PortfolioSnapshot {
        let (daily_pnl, daily_pnl_pct) = match self.previous_before(date) {
            Some(prev) if prev.total_value > 0.0 => {
                let pnl = valuation.total_value - prev.total_value;
                (pnl, pnl / prev.total_value)
            }
            _ => (0.0, 0.0),
        };
        PortfolioSnapshot {
            date,
            cash: valuation.cash,
            holdings_value: valuation.holdings_value,
            total_value: valuation.total_value,
            daily_pnl,
            daily_pnl_pct,
            recorded_at: at,
        }
    }

    /// Insert or overwrite by date.
    pub fn upsert(&mut self, snapshot: PortfolioSnapshot) {
        self.by_date.insert(snapshot.date, snapshot);
    }
}
