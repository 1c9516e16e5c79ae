//! # Primitive Values
//!
//! Native representations carried by primitive nodes.
//!
//! Once a classifier is known to be a top level, the kind decision is a
//! single lookup of its name in [`KIND_TABLE`]. The node's name stays
//! the literal text; the parsed value sits next to it.

use crate::primitives::{
    BOOLEAN_TYPE_NAME, DATE_TYPE_NAME, DATETIME_TYPE_NAME, DECIMAL_TYPE_NAME, FLOAT_TYPE_NAME,
    INTEGER_TYPE_NAME, STRICT_DATE_TYPE_NAME, STRING_TYPE_NAME,
};
use crate::types::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// NODE KIND
// =============================================================================

/// Construction variant chosen for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Generic,
    Boolean,
    Integer,
    Float,
    Decimal,
    String,
    Date,
    StrictDate,
    DateTime,
}

/// Classifier name to primitive kind. Anything not listed is `Generic`.
const KIND_TABLE: [(&str, NodeKind); 8] = [
    (BOOLEAN_TYPE_NAME, NodeKind::Boolean),
    (DATE_TYPE_NAME, NodeKind::Date),
    (STRICT_DATE_TYPE_NAME, NodeKind::StrictDate),
    (DATETIME_TYPE_NAME, NodeKind::DateTime),
    (FLOAT_TYPE_NAME, NodeKind::Float),
    (DECIMAL_TYPE_NAME, NodeKind::Decimal),
    (INTEGER_TYPE_NAME, NodeKind::Integer),
    (STRING_TYPE_NAME, NodeKind::String),
];

impl NodeKind {
    /// Pick the kind for instances of a classifier named `type_name`.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Self {
        KIND_TABLE
            .iter()
            .find(|(name, _)| *name == type_name)
            .map_or(Self::Generic, |(_, kind)| *kind)
    }

    /// Classifier name for a primitive kind; `None` for `Generic`.
    #[must_use]
    pub fn type_name(self) -> Option<&'static str> {
        KIND_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
    }

    #[must_use]
    pub fn is_primitive(self) -> bool {
        self != Self::Generic
    }
}

// =============================================================================
// PRIMITIVE VALUE
// =============================================================================

/// Parsed value of a primitive node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    /// An Integer literal too wide for `i64`, kept as its canonical digits.
    BigInteger(String),
    Float(f64),
    /// Decimal digits without the optional `D` suffix.
    Decimal(String),
    String(String),
    Date(PureDate),
    StrictDate(PureDate),
    DateTime(PureDate),
}

impl PrimitiveValue {
    /// Parse `literal` as a value of `kind`.
    ///
    /// Returns `Ok(None)` for `Generic`, which carries no native value.
    pub fn parse(kind: NodeKind, literal: &str) -> Result<Option<Self>, GraphError> {
        let invalid = || GraphError::InvalidPrimitive {
            type_name: kind.type_name().unwrap_or("Generic").to_string(),
            literal: literal.to_string(),
        };

        let value = match kind {
            NodeKind::Generic => return Ok(None),
            NodeKind::Boolean => match literal {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(invalid()),
            },
            NodeKind::Integer => match literal.parse::<i64>() {
                Ok(value) => Self::Integer(value),
                Err(_) if is_integer_literal(literal) => Self::BigInteger(literal.to_string()),
                Err(_) => return Err(invalid()),
            },
            NodeKind::Float => {
                let value: f64 = literal.parse().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(invalid());
                }
                Self::Float(value)
            }
            NodeKind::Decimal => {
                let digits = literal
                    .strip_suffix(['d', 'D'])
                    .unwrap_or(literal);
                if !is_decimal_literal(digits) {
                    return Err(invalid());
                }
                Self::Decimal(digits.to_string())
            }
            NodeKind::String => Self::String(literal.to_string()),
            NodeKind::Date => Self::Date(literal.parse().map_err(|_| invalid())?),
            NodeKind::StrictDate => {
                let date: PureDate = literal.parse().map_err(|_| invalid())?;
                if !date.is_strict_date() {
                    return Err(invalid());
                }
                Self::StrictDate(date)
            }
            NodeKind::DateTime => {
                let date: PureDate = literal.parse().map_err(|_| invalid())?;
                if !date.has_time() {
                    return Err(invalid());
                }
                Self::DateTime(date)
            }
        };
        Ok(Some(value))
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Boolean(_) => NodeKind::Boolean,
            Self::Integer(_) | Self::BigInteger(_) => NodeKind::Integer,
            Self::Float(_) => NodeKind::Float,
            Self::Decimal(_) => NodeKind::Decimal,
            Self::String(_) => NodeKind::String,
            Self::Date(_) => NodeKind::Date,
            Self::StrictDate(_) => NodeKind::StrictDate,
            Self::DateTime(_) => NodeKind::DateTime,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Digits of an Integer of any width.
    #[must_use]
    pub fn integer_digits(&self) -> Option<String> {
        match self {
            Self::Integer(value) => Some(value.to_string()),
            Self::BigInteger(digits) => Some(digits.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Decimal(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<&PureDate> {
        match self {
            Self::Date(date) | Self::StrictDate(date) | Self::DateTime(date) => Some(date),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::BigInteger(value) | Self::Decimal(value) | Self::String(value) => {
                f.write_str(value)
            }
            Self::Date(date) | Self::StrictDate(date) | Self::DateTime(date) => {
                write!(f, "{date}")
            }
        }
    }
}

/// `[+-]digits` with at least one digit.
fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `[+-]digits[.digits][e[+-]digits]` with at least one mantissa digit.
fn is_decimal_literal(text: &str) -> bool {
    let text = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return false;
    }
    if !all_digits(whole) || !all_digits(fraction) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
    }
}

// =============================================================================
// DATES
// =============================================================================

/// A date with variable precision.
///
/// Accepted forms: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, and
/// `YYYY-MM-DDThh[:mm[:ss[.fff]]]` with an optional `Z` or `+hhmm`/`-hhmm`
/// offset after the time. Components are range-checked, including the
/// number of days in the month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PureDate {
    year: i32,
    month: Option<u8>,
    day: Option<u8>,
    hour: Option<u8>,
    minute: Option<u8>,
    second: Option<u8>,
    subsecond: Option<String>,
    offset: Option<String>,
}

impl PureDate {
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> Option<u8> {
        self.month
    }

    #[must_use]
    pub fn day(&self) -> Option<u8> {
        self.day
    }

    #[must_use]
    pub fn hour(&self) -> Option<u8> {
        self.hour
    }

    #[must_use]
    pub fn minute(&self) -> Option<u8> {
        self.minute
    }

    #[must_use]
    pub fn second(&self) -> Option<u8> {
        self.second
    }

    /// Fractional-second digits exactly as written.
    #[must_use]
    pub fn subsecond(&self) -> Option<&str> {
        self.subsecond.as_deref()
    }

    /// A day-precision date with no time component.
    #[must_use]
    pub fn is_strict_date(&self) -> bool {
        self.day.is_some() && self.hour.is_none()
    }

    #[must_use]
    pub fn has_time(&self) -> bool {
        self.hour.is_some()
    }
}

struct DateCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl DateCursor<'_> {
    fn eat(&mut self, byte: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Exactly `count` ASCII digits.
    fn fixed(&mut self, count: usize) -> Option<u32> {
        let end = self.pos.checked_add(count)?;
        let slice = self.bytes.get(self.pos..end)?;
        if !slice.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.pos = end;
        Some(
            slice
                .iter()
                .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')),
        )
    }

    /// One or more ASCII digits.
    fn run(&mut self) -> Option<&str> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn bounded(value: u32, min: u32, max: u32) -> Option<u8> {
    if (min..=max).contains(&value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}

fn days_in_month(year: i32, month: u8) -> u8 {
    let leap = year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0);
    match month {
        2 if leap => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn parse_date(text: &str) -> Option<PureDate> {
    let mut cursor = DateCursor {
        bytes: text.as_bytes(),
        pos: 0,
    };

    let negative = cursor.eat(b'-');
    let year: i32 = cursor.run()?.parse().ok()?;
    let mut date = PureDate {
        year: if negative { -year } else { year },
        month: None,
        day: None,
        hour: None,
        minute: None,
        second: None,
        subsecond: None,
        offset: None,
    };

    if cursor.eat(b'-') {
        let month = bounded(cursor.fixed(2)?, 1, 12)?;
        date.month = Some(month);
        if cursor.eat(b'-') {
            let max = u32::from(days_in_month(date.year, month));
            date.day = Some(bounded(cursor.fixed(2)?, 1, max)?);
            if cursor.eat(b'T') {
                date.hour = Some(bounded(cursor.fixed(2)?, 0, 23)?);
                if cursor.eat(b':') {
                    date.minute = Some(bounded(cursor.fixed(2)?, 0, 59)?);
                    if cursor.eat(b':') {
                        date.second = Some(bounded(cursor.fixed(2)?, 0, 59)?);
                        if cursor.eat(b'.') {
                            date.subsecond = Some(cursor.run()?.to_string());
                        }
                    }
                }
                date.offset = match cursor.peek() {
                    Some(b'Z') => {
                        cursor.pos += 1;
                        Some("Z".to_string())
                    }
                    Some(sign @ (b'+' | b'-')) => {
                        cursor.pos += 1;
                        let hours = bounded(cursor.fixed(2)?, 0, 23)?;
                        let minutes = bounded(cursor.fixed(2)?, 0, 59)?;
                        Some(format!("{}{hours:02}{minutes:02}", char::from(sign)))
                    }
                    _ => None,
                };
            }
        }
    }

    cursor.at_end().then_some(date)
}

impl FromStr for PureDate {
    type Err = GraphError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_date(text).ok_or_else(|| GraphError::InvalidPrimitive {
            type_name: DATE_TYPE_NAME.to_string(),
            literal: text.to_string(),
        })
    }
}

impl fmt::Display for PureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year < 0 {
            write!(f, "-{:04}", self.year.unsigned_abs())?;
        } else {
            write!(f, "{:04}", self.year)?;
        }
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
        }
        if let Some(day) = self.day {
            write!(f, "-{day:02}")?;
        }
        if let Some(hour) = self.hour {
            write!(f, "T{hour:02}")?;
        }
        if let Some(minute) = self.minute {
            write!(f, ":{minute:02}")?;
        }
        if let Some(second) = self.second {
            write!(f, ":{second:02}")?;
        }
        if let Some(subsecond) = &self.subsecond {
            write!(f, ".{subsecond}")?;
        }
        if let Some(offset) = &self.offset {
            f.write_str(offset)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
