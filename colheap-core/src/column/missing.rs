//! Missing-value rules.
//!
//! A rule pairs a comparison operator with an operand. A level is treated as
//! missing when any rule of its column matches it. Text columns match against
//! a level's label and import value; integer columns against the label and the
//! literal level value.

use super::record::{MissingValueRecord, OPERAND_DECIMAL, OPERAND_INTEGER, OPERAND_TEXT};
use crate::error::{HeapError, Result};
use crate::heap::Heap;
use crate::types::HeapOffset;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operator {
    /// `==`
    Eq = 0,
    /// `!=`
    Ne = 1,
    /// `<`
    Lt = 2,
    /// `<=`
    Le = 3,
    /// `>`
    Gt = 4,
    /// `>=`
    Ge = 5,
}

impl Operator {
    fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Lt,
            3 => Self::Le,
            4 => Self::Gt,
            5 => Self::Ge,
            _ => {
                return Err(HeapError::InvalidTypeCode {
                    kind: "missing value operator",
                    code,
                });
            }
        })
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Right-hand side of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Compared as text; ordering operators fall back to numbers.
    Text(String),
    /// Compared numerically.
    Decimal(f64),
    /// Compared numerically.
    Integer(i32),
}

/// The value a level is matched against besides its label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelLiteral<'a> {
    /// The import value of a text level.
    Text(&'a str),
    /// The literal value of an integer level.
    Integer(i32),
}

impl LevelLiteral<'_> {
    fn text_eq(&self, text: &str) -> bool {
        match self {
            Self::Text(s) => *s == text,
            Self::Integer(v) => text.trim().parse::<i32>() == Ok(*v),
        }
    }

    fn number(&self, label: &str) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(f64::from(*v)),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .or_else(|| label.trim().parse::<f64>().ok()),
        }
    }
}

/// A column-scoped "treat as missing" rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueRule {
    /// The comparison.
    pub operator: Operator,
    /// The operand.
    pub operand: Operand,
}

impl MissingValueRule {
    /// Create a rule.
    pub fn new(operator: Operator, operand: Operand) -> Self {
        Self { operator, operand }
    }

    /// Shorthand for `== text`.
    pub fn equals(text: impl Into<String>) -> Self {
        Self::new(Operator::Eq, Operand::Text(text.into()))
    }

    /// Check whether the rule matches a level.
    pub fn matches(&self, label: &str, literal: LevelLiteral<'_>) -> bool {
        let compare = |rhs: f64| {
            literal
                .number(label)
                .and_then(|lhs| lhs.partial_cmp(&rhs))
                .is_some_and(|ordering| self.operator.accepts(ordering))
        };

        match &self.operand {
            Operand::Text(text) => match self.operator {
                Operator::Eq => label == text || literal.text_eq(text),
                Operator::Ne => !(label == text || literal.text_eq(text)),
                _ => text.trim().parse::<f64>().is_ok_and(compare),
            },
            Operand::Decimal(d) => compare(*d),
            Operand::Integer(i) => compare(f64::from(*i)),
        }
    }

    /// Store the rule's operand in the heap and build its record.
    pub(crate) fn to_record(&self, heap: &mut Heap) -> Result<MissingValueRecord> {
        let (kind, value) = match &self.operand {
            Operand::Text(text) => (OPERAND_TEXT, heap.write_str(text)?.0.as_u64()),
            Operand::Decimal(d) => (OPERAND_DECIMAL, d.to_bits()),
            Operand::Integer(i) => (OPERAND_INTEGER, i64::from(*i) as u64),
        };
        Ok(MissingValueRecord {
            kind,
            operator: self.operator as u8,
            _pad: [0; 6],
            value,
        })
    }

    /// Rebuild a rule from its stored record.
    pub(crate) fn from_record(record: &MissingValueRecord, heap: &Heap) -> Result<Self> {
        let operand = match record.kind {
            OPERAND_TEXT => Operand::Text(heap.read_str(HeapOffset::new(record.value))?.to_string()),
            OPERAND_DECIMAL => Operand::Decimal(f64::from_bits(record.value)),
            OPERAND_INTEGER => Operand::Integer(record.value as i64 as i32),
            code => {
                return Err(HeapError::InvalidTypeCode {
                    kind: "missing value operand",
                    code,
                });
            }
        };
        Ok(Self::new(Operator::from_code(record.operator)?, operand))
    }
}

/// Evaluate a rule set against one level.
pub fn should_treat_as_missing(
    rules: &[MissingValueRule],
    label: &str,
    literal: LevelLiteral<'_>,
) -> bool {
    rules.iter().any(|rule| rule.matches(label, literal))
}

impl FromStr for MissingValueRule {
    type Err = HeapError;

    /// Parse rules such as `== NA`, `<= -99` or `"-99"`. A missing operator
    /// means `==`; quotes force a text operand.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let operators = [
            ("==", Operator::Eq),
            ("!=", Operator::Ne),
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("<", Operator::Lt),
            (">", Operator::Gt),
            ("=", Operator::Eq),
        ];

        let (operator, rest) = operators
            .iter()
            .find_map(|(symbol, op)| trimmed.strip_prefix(symbol).map(|rest| (*op, rest)))
            .unwrap_or((Operator::Eq, trimmed));

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(HeapError::MissingValueSyntax {
                rule: s.to_string(),
                cause: "missing operand".to_string(),
            });
        }

        let quoted = ['"', '\'']
            .iter()
            .find_map(|q| rest.strip_prefix(*q).and_then(|r| r.strip_suffix(*q)));

        let operand = if let Some(text) = quoted {
            Operand::Text(text.to_string())
        } else if let Ok(i) = rest.parse::<i32>() {
            Operand::Integer(i)
        } else if let Ok(d) = rest.parse::<f64>() {
            Operand::Decimal(d)
        } else {
            Operand::Text(rest.to_string())
        };

        Ok(Self::new(operator, operand))
    }
}

impl fmt::Display for MissingValueRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Text(t) => write!(f, "{} \"{}\"", self.operator.symbol(), t),
            Operand::Decimal(d) => write!(f, "{} {}", self.operator.symbol(), d),
            Operand::Integer(i) => write!(f, "{} {}", self.operator.symbol(), i),
        }
    }
}
