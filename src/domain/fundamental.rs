//! Fundamental grading: Piotroski F-Score and the A–F grade.
//!
//! Periods are ordered oldest to newest. The F-Score compares the newest
//! period against the one before it; a criterion whose inputs are missing is
//! reported as unknown and left out of the denominator. The grade walks the
//! band tables in `GradeTable` and never hard-codes a threshold.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::composite::Confidence;
use crate::domain::error::TradegateError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub period: String,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub gross_margin: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub total_equity: Option<f64>,
}

fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

impl StatementPeriod {
    pub fn return_on_assets(&self) -> Option<f64> {
        ratio(self.net_income, self.total_assets)
    }

    /// Long-term debt over assets, falling back to total liabilities.
    pub fn leverage(&self) -> Option<f64> {
        ratio(self.long_term_debt.or(self.total_liabilities), self.total_assets)
    }

    pub fn current_ratio(&self) -> Option<f64> {
        ratio(self.current_assets, self.current_liabilities)
    }

    pub fn turnover(&self) -> Option<f64> {
        self.asset_turnover
            .or_else(|| ratio(self.revenue, self.total_assets))
    }

    pub fn equity(&self) -> Option<f64> {
        self.total_equity.or(match (self.total_assets, self.total_liabilities) {
            (Some(a), Some(l)) => Some(a - l),
            _ => None,
        })
    }

    /// Return on equity in percent.
    pub fn return_on_equity_pct(&self) -> Option<f64> {
        ratio(self.net_income, self.equity()).map(|r| r * 100.0)
    }

    pub fn debt_to_equity(&self) -> Option<f64> {
        ratio(self.total_liabilities, self.equity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    PositiveNetIncome,
    PositiveOperatingCashFlow,
    ImprovingReturnOnAssets,
    CashFlowExceedsIncome,
    FallingLeverage,
    ImprovingLiquidity,
    NoDilution,
    ImprovingGrossMargin,
    ImprovingAssetTurnover,
}

impl Criterion {
    pub const ALL: [Criterion; 9] = [
        Criterion::PositiveNetIncome,
        Criterion::PositiveOperatingCashFlow,
        Criterion::ImprovingReturnOnAssets,
        Criterion::CashFlowExceedsIncome,
        Criterion::FallingLeverage,
        Criterion::ImprovingLiquidity,
        Criterion::NoDilution,
        Criterion::ImprovingGrossMargin,
        Criterion::ImprovingAssetTurnover,
    ];

    fn check(&self, cur: &StatementPeriod, prev: &StatementPeriod) -> Option<bool> {
        let improved = |a: Option<f64>, b: Option<f64>| Some(a? > b?);
        match self {
            Criterion::PositiveNetIncome => cur.net_income.map(|v| v > 0.0),
            Criterion::PositiveOperatingCashFlow => cur.operating_cash_flow.map(|v| v > 0.0),
            Criterion::ImprovingReturnOnAssets => {
                improved(cur.return_on_assets(), prev.return_on_assets())
            }
            Criterion::CashFlowExceedsIncome => improved(cur.operating_cash_flow, cur.net_income),
            Criterion::FallingLeverage => improved(prev.leverage(), cur.leverage()),
            Criterion::ImprovingLiquidity => improved(cur.current_ratio(), prev.current_ratio()),
            Criterion::NoDilution => Some(cur.shares_outstanding? <= prev.shares_outstanding?),
            Criterion::ImprovingGrossMargin => improved(cur.gross_margin, prev.gross_margin),
            Criterion::ImprovingAssetTurnover => improved(cur.turnover(), prev.turnover()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionResult {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strength::Strong => "strong",
            Strength::Moderate => "moderate",
            Strength::Weak => "weak",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FScore {
    pub passes: u8,
    pub known: u8,
    pub strength: Strength,
    pub criteria: Vec<(Criterion, CriterionResult)>,
}

impl FScore {
    /// Passes scaled to the nine-point range, so partial coverage stays comparable.
    pub fn normalized(&self) -> f64 {
        if self.known == 0 {
            0.0
        } else {
            f64::from(self.passes) * 9.0 / f64::from(self.known)
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self.known {
            9 => Confidence::High,
            6..=8 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for FScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.passes, self.known, self.strength)
    }
}

fn strength_of(normalized: f64) -> Strength {
    if normalized >= 7.0 {
        Strength::Strong
    } else if normalized <= 3.0 {
        Strength::Weak
    } else {
        Strength::Moderate
    }
}

pub fn f_score(periods: &[StatementPeriod]) -> Result<FScore, TradegateError> {
    let [.., prev, cur] = periods else {
        return Err(TradegateError::InsufficientData {
            reason: format!(
                "F-Score needs at least 2 statement periods, got {}",
                periods.len()
            ),
        });
    };

    let criteria: Vec<(Criterion, CriterionResult)> = Criterion::ALL
        .iter()
        .map(|c| {
            let result = match c.check(cur, prev) {
                Some(true) => CriterionResult::Pass,
                Some(false) => CriterionResult::Fail,
                None => CriterionResult::Unknown,
            };
            (*c, result)
        })
        .collect();

    let passes = criteria
        .iter()
        .filter(|(_, r)| *r == CriterionResult::Pass)
        .count() as u8;
    let known = criteria
        .iter()
        .filter(|(_, r)| *r != CriterionResult::Unknown)
        .count() as u8;

    if known == 0 {
        return Err(TradegateError::InsufficientData {
            reason: "no F-Score criterion could be evaluated".to_string(),
        });
    }

    let mut score = FScore {
        passes,
        known,
        strength: Strength::Moderate,
        criteria,
    };
    score.strength = strength_of(score.normalized());
    Ok(score)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// First band the value clears awards its points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub threshold: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTable {
    pub direction: Direction,
    pub bands: Vec<Band>,
}

impl FactorTable {
    pub fn points(&self, value: Option<f64>) -> f64 {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return 0.0;
        };
        self.bands
            .iter()
            .find(|b| match self.direction {
                Direction::HigherIsBetter => v > b.threshold,
                Direction::LowerIsBetter => v < b.threshold,
            })
            .map(|b| b.points)
            .unwrap_or(0.0)
    }

    pub fn max_points(&self) -> f64 {
        self.bands.iter().map(|b| b.points).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTable {
    pub fscore_max_points: f64,
    pub return_on_equity: FactorTable,
    pub debt_to_equity: FactorTable,
    pub profit_growth: FactorTable,
    pub current_ratio: FactorTable,
    /// Minimum points for A, B, C and D; anything lower is F.
    pub cutoffs: [f64; 4],
}

impl Default for GradeTable {
    fn default() -> Self {
        let bands = |pairs: &[(f64, f64)]| {
            pairs
                .iter()
                .map(|(threshold, points)| Band {
                    threshold: *threshold,
                    points: *points,
                })
                .collect()
        };
        GradeTable {
            fscore_max_points: 30.0,
            return_on_equity: FactorTable {
                direction: Direction::HigherIsBetter,
                bands: bands(&[(15.0, 20.0), (10.0, 15.0), (5.0, 10.0)]),
            },
            debt_to_equity: FactorTable {
                direction: Direction::LowerIsBetter,
                bands: bands(&[(0.5, 20.0), (1.0, 15.0), (2.0, 10.0)]),
            },
            profit_growth: FactorTable {
                direction: Direction::HigherIsBetter,
                bands: bands(&[(20.0, 15.0), (10.0, 10.0), (0.0, 5.0)]),
            },
            current_ratio: FactorTable {
                direction: Direction::HigherIsBetter,
                bands: bands(&[(2.0, 15.0), (1.5, 10.0), (1.0, 5.0)]),
            },
            cutoffs: [80.0, 65.0, 50.0, 35.0],
        }
    }
}

impl GradeTable {
    pub fn grade_for(&self, points: f64) -> Grade {
        let grades = [Grade::A, Grade::B, Grade::C, Grade::D];
        grades
            .iter()
            .zip(self.cutoffs)
            .find(|(_, cutoff)| points >= *cutoff)
            .map(|(g, _)| *g)
            .unwrap_or(Grade::F)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentalGrade {
    pub grade: Grade,
    pub points: f64,
    pub fscore: FScore,
    pub return_on_equity_pct: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub profit_growth_pct: Option<f64>,
    pub confidence: Confidence,
}

/// Year-over-year net income growth in percent. Needs at least three periods;
/// compares against four quarters back when five exist, else the oldest.
pub fn profit_growth_pct(periods: &[StatementPeriod]) -> Option<f64> {
    if periods.len() < 3 {
        return None;
    }
    let latest = periods.last()?.net_income?;
    let base_idx = if periods.len() >= 5 {
        periods.len() - 5
    } else {
        0
    };
    let base = periods[base_idx].net_income?;
    if base == 0.0 {
        return None;
    }
    Some((latest - base) / base.abs() * 100.0)
}

pub fn grade(periods: &[StatementPeriod], table: &GradeTable) -> Result<FundamentalGrade, TradegateError> {
    let fscore = f_score(periods)?;
    let latest = periods.last().ok_or_else(|| TradegateError::InsufficientData {
        reason: "no statement periods".to_string(),
    })?;

    let return_on_equity_pct = latest.return_on_equity_pct();
    let debt_to_equity = latest.debt_to_equity();
    let current_ratio = latest.current_ratio();
    let profit_growth_pct = profit_growth_pct(periods);

    let fscore_points =
        (fscore.normalized() / 9.0 * table.fscore_max_points).min(table.fscore_max_points);
    let points = fscore_points
        + table.return_on_equity.points(return_on_equity_pct)
        + table.debt_to_equity.points(debt_to_equity)
        + table.profit_growth.points(profit_growth_pct)
        + table.current_ratio.points(current_ratio);

    let ratios_known = [
        return_on_equity_pct,
        debt_to_equity,
        current_ratio,
        profit_growth_pct,
    ]
    .iter()
    .filter(|r| r.is_some())
    .count();
    let confidence = match (fscore.confidence(), ratios_known) {
        (Confidence::High, 4) => Confidence::High,
        (Confidence::Low, _) => Confidence::Low,
        (_, n) if n >= 2 => Confidence::Medium,
        _ => Confidence::Low,
    };

    Ok(FundamentalGrade {
        grade: table.grade_for(points),
        points,
        fscore,
        return_on_equity_pct,
        debt_to_equity,
        current_ratio,
        profit_growth_pct,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn period(name: &str, ni: f64) -> StatementPeriod {
        StatementPeriod {
            period: name.to_string(),
            revenue: Some(1000.0),
            net_income: Some(ni),
            operating_cash_flow: Some(ni * 1.2),
            total_assets: Some(5000.0),
            total_liabilities: Some(2000.0),
            current_assets: Some(1500.0),
            current_liabilities: Some(1000.0),
            shares_outstanding: Some(100.0),
            gross_margin: Some(0.30),
            asset_turnover: Some(0.20),
            long_term_debt: Some(800.0),
            total_equity: Some(3000.0),
        }
    }

    fn improving_pair() -> Vec<StatementPeriod> {
        let prev = period("2024Q1", 100.0);
        let mut cur = period("2024Q2", 150.0);
        cur.long_term_debt = Some(700.0);
        cur.current_assets = Some(1700.0);
        cur.shares_outstanding = Some(99.0);
        cur.gross_margin = Some(0.32);
        cur.asset_turnover = Some(0.22);
        vec![prev, cur]
    }

    #[test]
    fn fewer_than_two_periods_is_insufficient() {
        let err = f_score(&[period("2024Q1", 100.0)]).unwrap_err();
        assert!(matches!(err, TradegateError::InsufficientData { .. }));
        assert!(f_score(&[]).is_err());
    }

    #[test]
    fn improving_company_scores_nine() {
        let score = f_score(&improving_pair()).unwrap();
        assert_eq!(score.passes, 9);
        assert_eq!(score.known, 9);
        assert_eq!(score.strength, Strength::Strong);
        assert_eq!(score.to_string(), "9/9 (strong)");
    }

    #[test]
    fn deteriorating_company_is_weak() {
        let prev = period("2024Q1", 100.0);
        let mut cur = period("2024Q2", -50.0);
        cur.operating_cash_flow = Some(-80.0);
        cur.long_term_debt = Some(900.0);
        cur.current_assets = Some(1200.0);
        cur.shares_outstanding = Some(110.0);
        cur.gross_margin = Some(0.25);
        cur.asset_turnover = Some(0.15);
        let score = f_score(&[prev, cur]).unwrap();
        assert_eq!(score.passes, 0);
        assert_eq!(score.strength, Strength::Weak);
    }

    #[test]
    fn missing_field_is_unknown_not_fail() {
        let mut periods = improving_pair();
        periods[1].gross_margin = None;
        let score = f_score(&periods).unwrap();
        assert_eq!(score.known, 8);
        assert_eq!(score.passes, 8);
        assert!(
            score
                .criteria
                .contains(&(Criterion::ImprovingGrossMargin, CriterionResult::Unknown))
        );
        assert_eq!(score.to_string(), "8/8 (strong)");
    }

    #[test]
    fn leverage_falls_back_to_liabilities() {
        let mut periods = improving_pair();
        periods[0].long_term_debt = None;
        periods[1].long_term_debt = None;
        periods[1].total_liabilities = Some(1900.0);
        let score = f_score(&periods).unwrap();
        assert!(
            score
                .criteria
                .contains(&(Criterion::FallingLeverage, CriterionResult::Pass))
        );
    }

    #[test]
    fn only_newest_two_periods_drive_score() {
        let mut periods = vec![period("2023Q4", 999.0)];
        periods.extend(improving_pair());
        assert_eq!(f_score(&periods).unwrap().passes, 9);
    }

    #[test]
    fn growth_needs_three_periods() {
        assert_eq!(profit_growth_pct(&improving_pair()), None);
        let periods = vec![
            period("Q1", 100.0),
            period("Q2", 110.0),
            period("Q3", 125.0),
        ];
        assert_relative_eq!(profit_growth_pct(&periods).unwrap(), 25.0);
    }

    #[test]
    fn growth_uses_four_quarters_back() {
        let periods: Vec<StatementPeriod> = [50.0, 100.0, 90.0, 95.0, 98.0, 120.0]
            .iter()
            .enumerate()
            .map(|(i, ni)| period(&format!("P{}", i), *ni))
            .collect();
        assert_relative_eq!(profit_growth_pct(&periods).unwrap(), 20.0);
    }

    #[test]
    fn factor_table_walks_bands() {
        let table = GradeTable::default();
        assert_relative_eq!(table.return_on_equity.points(Some(16.0)), 20.0);
        assert_relative_eq!(table.return_on_equity.points(Some(15.0)), 15.0);
        assert_relative_eq!(table.return_on_equity.points(Some(2.0)), 0.0);
        assert_relative_eq!(table.debt_to_equity.points(Some(0.4)), 20.0);
        assert_relative_eq!(table.debt_to_equity.points(Some(1.5)), 10.0);
        assert_relative_eq!(table.debt_to_equity.points(Some(3.0)), 0.0);
        assert_relative_eq!(table.current_ratio.points(None), 0.0);
    }

    #[test]
    fn grade_cutoffs() {
        let table = GradeTable::default();
        assert_eq!(table.grade_for(80.0), Grade::A);
        assert_eq!(table.grade_for(79.9), Grade::B);
        assert_eq!(table.grade_for(50.0), Grade::C);
        assert_eq!(table.grade_for(35.0), Grade::D);
        assert_eq!(table.grade_for(10.0), Grade::F);
    }

    #[test]
    fn grade_strong_company() {
        let mut periods = vec![period("2023Q4", 90.0)];
        periods.extend(improving_pair());
        let g = grade(&periods, &GradeTable::default()).unwrap();
        // ROE 150/3000 = 5% is not above 5, D/E 2000/3000 scores 15,
        // growth 150/90 - 1 = 66% scores 15, current ratio 1.7 scores 10.
        assert_relative_eq!(g.points, 30.0 + 0.0 + 15.0 + 15.0 + 10.0, epsilon = 1e-9);
        assert_eq!(g.grade, Grade::B);
        assert_eq!(g.confidence, Confidence::High);
    }

    #[test]
    fn grade_requires_two_periods() {
        let err = grade(&[period("Q1", 1.0)], &GradeTable::default()).unwrap_err();
        assert!(matches!(err, TradegateError::InsufficientData { .. }));
    }

    #[test]
    fn grade_thresholds_come_from_table() {
        let mut periods = vec![period("2023Q4", 90.0)];
        periods.extend(improving_pair());
        let mut table = GradeTable::default();
        table.cutoffs = [60.0, 50.0, 40.0, 30.0];
        assert_eq!(grade(&periods, &table).unwrap().grade, Grade::A);
    }

    #[derive(Debug, Clone, Copy)]
    enum Improvement {
        CashFlow,
        CurrentAssets,
        CurrentLiabilities,
        Shares,
        GrossMargin,
        Turnover,
        LongTermDebt,
    }

    fn apply(p: &mut StatementPeriod, which: Improvement, step: f64) {
        let bump = |v: &mut Option<f64>, d: f64| *v = v.map(|x| x + d);
        match which {
            Improvement::CashFlow => bump(&mut p.operating_cash_flow, step),
            Improvement::CurrentAssets => bump(&mut p.current_assets, step),
            Improvement::CurrentLiabilities => {
                p.current_liabilities = p.current_liabilities.map(|x| (x - step).max(1.0))
            }
            Improvement::Shares => p.shares_outstanding = p.shares_outstanding.map(|x| (x - step).max(1.0)),
            Improvement::GrossMargin => bump(&mut p.gross_margin, step / 1000.0),
            Improvement::Turnover => bump(&mut p.asset_turnover, step / 1000.0),
            Improvement::LongTermDebt => {
                p.long_term_debt = p.long_term_debt.map(|x| (x - step).max(0.0))
            }
        }
    }

    fn arb_period() -> impl Strategy<Value = StatementPeriod> {
        (
            -500.0f64..500.0,
            -500.0f64..500.0,
            100.0f64..2000.0,
            100.0f64..2000.0,
            50.0f64..150.0,
            0.0f64..1.0,
            0.0f64..1.0,
            0.0f64..3000.0,
        )
            .prop_map(|(ni, ocf, ca, cl, shares, gm, at, ltd)| StatementPeriod {
                period: "P".to_string(),
                revenue: Some(1000.0),
                net_income: Some(ni),
                operating_cash_flow: Some(ocf),
                total_assets: Some(5000.0),
                total_liabilities: Some(2500.0),
                current_assets: Some(ca),
                current_liabilities: Some(cl),
                shares_outstanding: Some(shares),
                gross_margin: Some(gm),
                asset_turnover: Some(at),
                long_term_debt: Some(ltd),
                total_equity: Some(2500.0),
            })
    }

    proptest! {
        #[test]
        fn improving_one_metric_never_lowers_fscore(
            prev in arb_period(),
            cur in arb_period(),
            which in prop::sample::select(vec![
                Improvement::CashFlow,
                Improvement::CurrentAssets,
                Improvement::CurrentLiabilities,
                Improvement::Shares,
                Improvement::GrossMargin,
                Improvement::Turnover,
                Improvement::LongTermDebt,
            ]),
            step in 0.0f64..500.0,
        ) {
            let before = f_score(&[prev.clone(), cur.clone()]).unwrap();
            let mut better = cur;
            apply(&mut better, which, step);
            let after = f_score(&[prev, better]).unwrap();
            prop_assert!(after.passes >= before.passes);
            prop_assert_eq!(after.known, before.known);
        }
    }
}
