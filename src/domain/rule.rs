//! Signal rule AST.
//!
//! - `Operand`: a named evaluation input or a constant
//! - `Rule`: comparison and composite predicates over operands
//!
//! Rules print back in the same DSL they are parsed from, which is how
//! evaluated conditions are labelled in classifier output.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Composite,
    Rsi,
    Sentiment,
    VolumeRatio,
    FScore,
    PriceChange,
    AbsPriceChange,
    Constant(f64),
}

impl Operand {
    pub const NAMED: [(&'static str, Operand); 7] = [
        ("composite", Operand::Composite),
        ("rsi", Operand::Rsi),
        ("sentiment", Operand::Sentiment),
        ("volume_ratio", Operand::VolumeRatio),
        ("fscore", Operand::FScore),
        ("price_change", Operand::PriceChange),
        ("abs_price_change", Operand::AbsPriceChange),
    ];

    pub fn from_name(name: &str) -> Option<Operand> {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, op)| *op)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Operand::Constant(v) = self {
            return write!(f, "{}", v);
        }
        let name = Self::NAMED
            .iter()
            .find(|(_, op)| op == self)
            .map(|(n, _)| *n)
            .unwrap_or("?");
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    pub fn above(left: Operand, threshold: f64) -> Rule {
        Rule::Above {
            left,
            right: Operand::Constant(threshold),
        }
    }

    pub fn below(left: Operand, threshold: f64) -> Rule {
        Rule::Below {
            left,
            right: Operand::Constant(threshold),
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Rule::Above { .. } | Rule::Below { .. } | Rule::Between { .. }
        )
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, keyword: &str, rules: &[Rule]) -> fmt::Result {
    write!(f, "{}(", keyword)?;
    for (i, r) in rules.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", r)?;
    }
    f.write_str(")")
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::And(rules) => write_list(f, "AND", rules),
            Rule::Or(rules) => write_list(f, "OR", rules),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
        }
    }
}
