//! Runtime value type for the expression language.
//!
//! Every value is an integer, a float or a string.  Unlike a general-purpose
//! scripting language there is no implicit numeric parsing of strings: the
//! arithmetic and comparison helpers below spell out each mixed-type case.

use std::cmp::Ordering;
use std::fmt;

/// An expression runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                // Whole floats keep a `.0` so they read back as floats.
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl Value {
    /// Coerce to boolean: `0`, `0.0` and `""` are falsy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Coerce to a string (clones for Str, formats for numeric variants).
    pub fn as_str(&self) -> String {
        self.to_string()
    }

    /// The number a value stands for in numeric comparisons.
    ///
    /// Strings are represented by their length in characters, never by
    /// parsing their contents.
    pub fn numeric_proxy(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(x) => *x,
            Value::Str(s) => s.chars().count() as f64,
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    pub fn arith_add(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let mut s = self.as_str();
                s.push_str(&rhs.as_str());
                Value::Str(s)
            }
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
            _ => Value::Float(self.numeric_proxy() + rhs.numeric_proxy()),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => self.clone(),
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(*b)),
            _ => Value::Float(self.numeric_proxy() - rhs.numeric_proxy()),
        }
    }

    pub fn arith_mul(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => self.clone(),
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(*b)),
            _ => Value::Float(self.numeric_proxy() * rhs.numeric_proxy()),
        }
    }

    /// Division.  Integer division by zero is reported as `Err`; float
    /// division follows IEEE semantics.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(self.clone()),
            (Value::Int(_), Value::Int(0)) => Err("division by zero".into()),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(*b))),
            _ => Ok(Value::Float(self.numeric_proxy() / rhs.numeric_proxy())),
        }
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(self.clone()),
            (Value::Int(_), Value::Int(0)) => Err("modulo by zero".into()),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
            _ => Ok(Value::Float(self.numeric_proxy() % rhs.numeric_proxy())),
        }
    }

    /// Numeric negation; strings are returned unchanged.
    pub fn arith_neg(&self) -> Value {
        match self {
            Value::Int(n) => Value::Int(n.wrapping_neg()),
            Value::Float(x) => Value::Float(-x),
            Value::Str(_) => self.clone(),
        }
    }

    /// Relational comparison used by `== != < <= > >=`.
    ///
    /// Two strings compare lexically; a string against a number compares its
    /// character count; numbers compare numerically across int/float.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            _ => self
                .numeric_proxy()
                .partial_cmp(&rhs.numeric_proxy())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(if b { 1 } else { 0 })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
