//! Signal classification.
//!
//! An ordered list of predicate → action rules evaluated by the rule
//! interpreter. The first rule whose predicate holds decides the action; HOLD
//! is the fallback. Every evaluated rule's conditions are reported.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::composite::{CompositeScore, Confidence};
use crate::domain::error::TradegateError;
use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_eval::{evaluate_traced, ConditionTrace, SignalInputs};
use crate::domain::rule_parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Watch,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Watch => "WATCH",
            SignalAction::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

impl FromStr for SignalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(SignalAction::Buy),
            "SELL" => Ok(SignalAction::Sell),
            "WATCH" => Ok(SignalAction::Watch),
            "HOLD" => Ok(SignalAction::Hold),
            other => Err(format!("unknown signal action '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRule {
    pub action: SignalAction,
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRuleSet {
    rules: Vec<SignalRule>,
}

impl Default for SignalRuleSet {
    fn default() -> Self {
        SignalRuleSet {
            rules: vec![
                SignalRule {
                    action: SignalAction::Buy,
                    rule: Rule::And(vec![
                        Rule::above(Operand::Composite, 60.0),
                        Rule::below(Operand::Rsi, 30.0),
                        Rule::above(Operand::Sentiment, 30.0),
                        Rule::above(Operand::VolumeRatio, 2.0),
                    ]),
                },
                SignalRule {
                    action: SignalAction::Sell,
                    rule: Rule::And(vec![
                        Rule::below(Operand::Composite, -60.0),
                        Rule::above(Operand::Rsi, 70.0),
                        Rule::below(Operand::Sentiment, -30.0),
                    ]),
                },
                SignalRule {
                    action: SignalAction::Watch,
                    rule: Rule::Or(vec![
                        Rule::above(Operand::VolumeRatio, 1.5),
                        Rule::above(Operand::AbsPriceChange, 3.0),
                    ]),
                },
            ],
        }
    }
}

impl SignalRuleSet {
    pub fn new(rules: Vec<SignalRule>) -> Result<Self, TradegateError> {
        if rules.iter().any(|r| r.action == SignalAction::Hold) {
            return Err(TradegateError::ConfigInvalid {
                section: "signals".to_string(),
                key: "hold".to_string(),
                reason: "HOLD is the fallback and cannot carry a rule".to_string(),
            });
        }
        Ok(SignalRuleSet { rules })
    }

    /// Replace the predicate for one action, keeping the rule order.
    pub fn with_override(mut self, action: SignalAction, text: &str) -> Result<Self, TradegateError> {
        let rule = rule_parser::parse(text)?;
        match self.rules.iter_mut().find(|r| r.action == action) {
            Some(existing) => existing.rule = rule,
            None => self.rules.push(SignalRule { action, rule }),
        }
        Self::new(self.rules)
    }

    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }

    pub fn classify(&self, composite: &CompositeScore, inputs: &SignalInputs) -> Signal {
        let mut evaluated = Vec::with_capacity(self.rules.len());
        let mut action = SignalAction::Hold;

        for rule in &self.rules {
            let mut conditions = Vec::new();
            let matched = evaluate_traced(&rule.rule, inputs, &mut conditions);
            evaluated.push(RuleTrace {
                action: rule.action,
                rule: rule.rule.to_string(),
                matched,
                conditions,
            });
            if matched {
                action = rule.action;
                break;
            }
        }

        Signal {
            symbol: composite.symbol.clone(),
            action,
            composite: composite.value,
            confidence: composite.confidence,
            evaluated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrace {
    pub action: SignalAction,
    pub rule: String,
    pub matched: bool,
    pub conditions: Vec<ConditionTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    pub composite: f64,
    pub confidence: Confidence,
    pub evaluated: Vec<RuleTrace>,
}

impl Signal {
    pub fn satisfied_conditions(&self) -> impl Iterator<Item = &ConditionTrace> {
        self.evaluated
            .iter()
            .flat_map(|r| r.conditions.iter())
            .filter(|c| c.satisfied)
    }
}
