//! Signal rule DSL parser.
//!
//! Recursive descent parser for rule text such as
//! `AND(ABOVE(composite, 60), BELOW(rsi, 30))`. Errors carry the character
//! offset together with the expected and found tokens.

use crate::domain::error::ParseError;
use crate::domain::rule::{Operand, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            Ok(())
        } else {
            let found = self.peek_word();
            Err(ParseError {
                message: format!("expected '{}', found '{}'", keyword, found),
                position: self.pos,
            })
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        match Operand::from_name(&word) {
            Some(operand) => {
                self.pos += word.len();
                Ok(operand)
            }
            None => {
                let names: Vec<&str> = Operand::NAMED.iter().map(|(n, _)| *n).collect();
                Err(ParseError {
                    message: format!(
                        "expected operand ({}) or number, found '{}'",
                        names.join(", "),
                        word
                    ),
                    position: self.pos,
                })
            }
        }
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        if keyword == "ABOVE" {
            Ok(Rule::Above { left, right })
        } else {
            Ok(Rule::Below { left, right })
        }
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower_pos = self.pos;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        if lower > upper {
            return Err(ParseError {
                message: format!("BETWEEN lower bound {} exceeds upper bound {}", lower, upper),
                position: lower_pos,
            });
        }

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        if self.peek_keyword("ABOVE") {
            return self.parse_comparison("ABOVE");
        }
        if self.peek_keyword("BELOW") {
            return self.parse_comparison("BELOW");
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }
        if self.peek_keyword("AND") {
            return self.parse_list("AND").map(Rule::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_list("OR").map(Rule::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        let word = self.peek_word();
        Err(ParseError {
            message: format!("expected rule, found '{}'", word),
            position: self.pos,
        })
    }

    fn parse_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];

        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(ParseError {
                message: format!("{} requires at least 2 rules", keyword),
                position: self.pos,
            });
        }

        Ok(rules)
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
