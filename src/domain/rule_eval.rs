//! Signal rule evaluation.
//!
//! Rules are evaluated against one symbol's `SignalInputs`.
//!
//! # Evaluation Semantics
//!
//! - Comparisons are strict (`ABOVE` is `>`, `BELOW` is `<`); `BETWEEN` is inclusive
//! - Missing inputs resolve to NaN, so every comparison on them is false
//! - `evaluate`: `AND`/`OR` short-circuit
//! - `evaluate_traced`: every leaf comparison is evaluated and recorded, so
//!   output can list satisfied and unsatisfied conditions alike

use serde::Serialize;

use crate::domain::rule::{Operand, Rule};

/// The named values a signal rule can refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalInputs {
    pub composite: f64,
    pub rsi: Option<f64>,
    pub sentiment: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub fscore: Option<f64>,
    pub price_change_pct: Option<f64>,
}

/// One leaf comparison as evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionTrace {
    pub condition: String,
    pub value: Option<f64>,
    pub satisfied: bool,
}

pub fn evaluate(rule: &Rule, inputs: &SignalInputs) -> bool {
    match rule {
        Rule::Above { left, right } => {
            resolve_operand(left, inputs) > resolve_operand(right, inputs)
        }
        Rule::Below { left, right } => {
            resolve_operand(left, inputs) < resolve_operand(right, inputs)
        }
        Rule::Between {
            operand,
            lower,
            upper,
        } => {
            let val = resolve_operand(operand, inputs);
            val >= *lower && val <= *upper
        }
        Rule::And(rules) => rules.iter().all(|r| evaluate(r, inputs)),
        Rule::Or(rules) => rules.iter().any(|r| evaluate(r, inputs)),
        Rule::Not(rule) => !evaluate(rule, inputs),
    }
}

/// Evaluate without short-circuiting, appending one trace per comparison.
pub fn evaluate_traced(rule: &Rule, inputs: &SignalInputs, trace: &mut Vec<ConditionTrace>) -> bool {
    match rule {
        Rule::And(rules) => rules
            .iter()
            .map(|r| evaluate_traced(r, inputs, trace))
            .fold(true, |acc, ok| acc && ok),
        Rule::Or(rules) => rules
            .iter()
            .map(|r| evaluate_traced(r, inputs, trace))
            .fold(false, |acc, ok| acc || ok),
        Rule::Not(inner) => !evaluate_traced(inner, inputs, trace),
        leaf => {
            let satisfied = evaluate(leaf, inputs);
            trace.push(ConditionTrace {
                condition: leaf.to_string(),
                value: leaf_value(leaf, inputs),
                satisfied,
            });
            satisfied
        }
    }
}

fn leaf_value(rule: &Rule, inputs: &SignalInputs) -> Option<f64> {
    let operand = match rule {
        Rule::Above { left, .. } | Rule::Below { left, .. } => left,
        Rule::Between { operand, .. } => operand,
        _ => return None,
    };
    let value = resolve_operand(operand, inputs);
    value.is_finite().then_some(value)
}

fn resolve_operand(operand: &Operand, inputs: &SignalInputs) -> f64 {
    let value = match operand {
        Operand::Composite => Some(inputs.composite),
        Operand::Rsi => inputs.rsi,
        Operand::Sentiment => inputs.sentiment,
        Operand::VolumeRatio => inputs.volume_ratio,
        Operand::FScore => inputs.fscore,
        Operand::PriceChange => inputs.price_change_pct,
        Operand::AbsPriceChange => inputs.price_change_pct.map(f64::abs),
        Operand::Constant(v) => Some(*v),
    };
    value.unwrap_or(f64::NAN)
}
