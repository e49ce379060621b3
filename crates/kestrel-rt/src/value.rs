// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Values exchanged between hosted units and the loop.
//!
//! The loop never inspects these; it only carries them from a sleep or a
//! finished task to whoever resumes next.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => fmt_float(*x, f),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Shortest round-trip form; exponent notation outside `[1e-4, 1e16)`.
fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        return write!(f, "nan");
    }
    if x.is_infinite() {
        return write!(f, "{}", if x < 0.0 { "-inf" } else { "inf" });
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{:e}", x);
        let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return write!(f, "{}e{}{:02}", mantissa, sign, exp.unsigned_abs());
    }
    let plain = x.to_string();
    if plain.contains('.') {
        write!(f, "{}", plain)
    } else {
        write!(f, "{}.0", plain)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_reference_repr() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
    }

    #[test]
    fn float_display_edge_cases() {
        assert_eq!(Value::Float(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::Float(1.5e-5).to_string(), "1.5e-05");
        assert_eq!(Value::Float(-2.5e16).to_string(), "-2.5e+16");
        assert_eq!(Value::Float(1e15).to_string(), "1000000000000000.0");
        assert_eq!(Value::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
    }

    #[test]
    fn as_int_accepts_bools() {
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::Str("1".into()).as_int(), None);
    }
}
