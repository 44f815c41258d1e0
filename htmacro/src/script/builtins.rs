//! Built-in expression functions.
//!
//! The set is closed: [`Function`] names every function the evaluator knows.
//! Eager [`Builtin`]s receive a `Vec<Value>` of already-evaluated arguments
//! and return `Result<Value, String>`; the evaluator turns an `Err` into a
//! warning plus [`Builtin::zero`].  `if` and `defined` inspect their argument
//! expressions and are evaluated by the caller.

use regex::Regex;

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Int,
    Float,
    Str,
    Len,
    Abs,
    Lower,
    Upper,
    Substr,
    Match,
    Replace,
    Min,
    Max,
}

/// Any callable name: one of the two argument-inspecting forms, or an eager
/// builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    If,
    Defined,
    Eager(Builtin),
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "if" => Some(Function::If),
            "defined" => Some(Function::Defined),
            _ => Builtin::from_name(name).map(Function::Eager),
        }
    }

    /// `(required, maximum)` argument counts; `None` means variadic.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::If => (3, Some(3)),
            Function::Defined => (1, Some(1)),
            Function::Eager(b) => b.arity(),
        }
    }

    pub fn zero(self) -> Value {
        match self {
            Function::Eager(b) => b.zero(),
            Function::If | Function::Defined => Value::Int(0),
        }
    }
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "len" => Builtin::Len,
            "abs" => Builtin::Abs,
            "lower" => Builtin::Lower,
            "upper" => Builtin::Upper,
            "substr" => Builtin::Substr,
            "match" => Builtin::Match,
            "replace" => Builtin::Replace,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        })
    }

    /// `(required, maximum)` argument counts; `None` means variadic.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::Substr => (2, Some(3)),
            Builtin::Match => (2, Some(2)),
            Builtin::Replace => (3, Some(3)),
            Builtin::Min | Builtin::Max => (1, None),
            _ => (1, Some(1)),
        }
    }

    /// The value substituted when a call cannot produce a result.
    pub fn zero(self) -> Value {
        match self {
            Builtin::Float => Value::Float(0.0),
            Builtin::Str
            | Builtin::Lower
            | Builtin::Upper
            | Builtin::Substr
            | Builtin::Replace => Value::Str(String::new()),
            _ => Value::Int(0),
        }
    }

    /// Apply the builtin to evaluated arguments.
    pub fn call(self, args: Vec<Value>) -> Result<Value, String> {
        let (min, _) = self.arity();
        if args.len() < min {
            return Err(format!("expects at least {min} argument(s)"));
        }
        Ok(match self {
            Builtin::Int => match &args[0] {
                Value::Int(n) => Value::Int(*n),
                Value::Float(x) => Value::Int(*x as i64),
                Value::Str(s) => Value::Int(parse_int(s)?),
            },
            Builtin::Float => match &args[0] {
                Value::Int(n) => Value::Float(*n as f64),
                Value::Float(x) => Value::Float(*x),
                Value::Str(s) => Value::Float(parse_float(s)?),
            },
            Builtin::Str => Value::Str(args[0].as_str()),
            Builtin::Len | Builtin::Abs => match &args[0] {
                Value::Int(n) => Value::Int(n.wrapping_abs()),
                Value::Float(x) => Value::Float(x.abs()),
                Value::Str(s) => Value::Int(s.chars().count() as i64),
            },
            Builtin::Lower => Value::Str(args[0].as_str().to_lowercase()),
            Builtin::Upper => Value::Str(args[0].as_str().to_uppercase()),
            Builtin::Substr => {
                let s = args[0].as_str();
                let begin = get_index(&args, 1)?;
                let end = match args.get(2) {
                    Some(_) => Some(get_index(&args, 2)?),
                    None => None,
                };
                Value::Str(substr(&s, begin, end))
            }
            Builtin::Match => {
                let re = compile(&args[1].as_str())?;
                Value::from(re.is_match(&args[0].as_str()))
            }
            Builtin::Replace => {
                let re = compile(&args[1].as_str())?;
                let repl = args[2].as_str();
                Value::Str(re.replace_all(&args[0].as_str(), repl.as_str()).into_owned())
            }
            Builtin::Min => pick(args, std::cmp::Ordering::Less),
            Builtin::Max => pick(args, std::cmp::Ordering::Greater),
        })
    }
}

/// Character-indexed substring.  Negative indices count from the end; both
/// ends are clamped to the string and swapped when reversed.
pub fn substr(s: &str, begin: i64, end: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let resolve = |i: i64| -> usize {
        let i = if i < 0 { len.saturating_add(i) } else { i };
        i.clamp(0, len) as usize
    };
    let mut b = resolve(begin);
    let mut e = end.map(resolve).unwrap_or(chars.len());
    if e < b {
        std::mem::swap(&mut b, &mut e);
    }
    chars[b..e].iter().collect()
}

fn pick(args: Vec<Value>, want: std::cmp::Ordering) -> Value {
    let mut best: Option<Value> = None;
    for v in args {
        let better = match &best {
            None => true,
            Some(b) => v.numeric_proxy().partial_cmp(&b.numeric_proxy()) == Some(want),
        };
        if better {
            best = Some(v);
        }
    }
    best.unwrap_or_default()
}

fn parse_int(s: &str) -> Result<i64, String> {
    let t = s.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Ok(n);
    }
    match t.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x.trunc() as i64),
        _ => Err(format!("cannot convert '{s}' to an integer")),
    }
}

fn parse_float(s: &str) -> Result<f64, String> {
    let t = s.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Ok(n as f64);
    }
    t.parse::<f64>()
        .map_err(|_| format!("cannot convert '{s}' to a float"))
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("bad regex '{pattern}': {e}"))
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn get_index(args: &[Value], idx: usize) -> Result<i64, String> {
    match args.get(idx) {
        Some(Value::Int(n)) => Ok(*n),
        Some(Value::Float(x)) => Ok(*x as i64),
        Some(Value::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("argument {} must be a number, got '{s}'", idx + 1)),
        None => Err(format!("missing argument {}", idx + 1)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        Builtin::from_name(name)
            .expect("not a builtin")
            .call(args)
            .expect("builtin failed")
    }

    fn s(v: &str) -> Value {
        Value::Str(v.into())
    }

    #[test]
    fn function_names() {
        for name in [
            "int", "float", "str", "len", "abs", "lower", "upper", "substr", "match", "replace",
            "min", "max",
        ] {
            let builtin = Builtin::from_name(name).expect(name);
            assert_eq!(Function::from_name(name), Some(Function::Eager(builtin)));
        }
        assert_eq!(Function::from_name("if"), Some(Function::If));
        assert_eq!(Function::from_name("defined"), Some(Function::Defined));
        assert_eq!(Builtin::from_name("if"), None);
        assert_eq!(Function::from_name("INT"), None);
        assert_eq!(Function::from_name("nope"), None);
    }

    #[test]
    fn int_conversions() {
        assert_eq!(call("int", vec![s("7.234")]), Value::Int(7));
        assert_eq!(call("int", vec![s(" 42 ")]), Value::Int(42));
        assert_eq!(call("int", vec![Value::Float(-3.9)]), Value::Int(-3));
        assert!(Builtin::Int.call(vec![s("abc")]).is_err());
    }

    #[test]
    fn float_conversions() {
        assert_eq!(call("float", vec![s("7")]), Value::Float(7.0));
        assert_eq!(call("float", vec![Value::Int(2)]), Value::Float(2.0));
        assert!(Builtin::Float.call(vec![s("x")]).is_err());
    }

    #[test]
    fn str_len_abs() {
        assert_eq!(call("str", vec![Value::Float(2.0)]), s("2.0"));
        assert_eq!(call("len", vec![s("héllo")]), Value::Int(5));
        assert_eq!(call("len", vec![Value::Int(-4)]), Value::Int(4));
        assert_eq!(call("abs", vec![Value::Float(-1.5)]), Value::Float(1.5));
        assert_eq!(call("abs", vec![s("abc")]), Value::Int(3));
    }

    #[test]
    fn case_mapping() {
        assert_eq!(call("upper", vec![s("Mixed")]), s("MIXED"));
        assert_eq!(call("lower", vec![s("Mixed")]), s("mixed"));
        assert_eq!(call("upper", vec![Value::Int(3)]), s("3"));
    }

    #[test]
    fn substr_indices() {
        assert_eq!(substr("ABCDEFG", 3, Some(-1)), "DEF");
        assert_eq!(substr("ABCDEFG", 3, None), "DEFG");
        assert_eq!(substr("ABCDEFG", -2, None), "FG");
        assert_eq!(substr("ABCDEFG", 5, Some(2)), "CDE");
        assert_eq!(substr("ABC", -10, Some(99)), "ABC");
        assert_eq!(substr("", 0, Some(3)), "");
        assert_eq!(
            call("substr", vec![s("ABCDEFG"), Value::Int(3), Value::Int(-1)]),
            s("DEF")
        );
    }

    #[test]
    fn regex_functions() {
        assert_eq!(call("match", vec![s("abc123"), s(r"\d+")]), Value::Int(1));
        assert_eq!(call("match", vec![s("abc"), s(r"\d")]), Value::Int(0));
        assert_eq!(
            call("replace", vec![s("a-b-c"), s("-"), s("+")]),
            s("a+b+c")
        );
        assert_eq!(
            call("replace", vec![s("john smith"), s(r"(\w+) (\w+)"), s("$2 $1")]),
            s("smith john")
        );
        assert!(Builtin::Match.call(vec![s("x"), s("(")]).is_err());
    }

    #[test]
    fn min_max_keep_original_value() {
        assert_eq!(
            call("max", vec![Value::Int(1), s("abcd"), Value::Float(3.5)]),
            s("abcd")
        );
        assert_eq!(call("min", vec![Value::Int(2), Value::Float(0.5)]), Value::Float(0.5));
        // Ties keep the first.
        assert_eq!(call("max", vec![Value::Int(3), s("abc")]), Value::Int(3));
        assert_eq!(call("min", vec![s("xy"), Value::Int(2)]), s("xy"));
    }

    #[test]
    fn arity_table() {
        assert_eq!(Function::If.arity(), (3, Some(3)));
        assert_eq!(Function::Eager(Builtin::Substr).arity(), (2, Some(3)));
        assert_eq!(Function::Eager(Builtin::Max).arity(), (1, None));
        assert!(Builtin::Replace.call(vec![s("a"), s("b")]).is_err());
    }

    #[test]
    fn zeros_by_type() {
        assert_eq!(Builtin::Float.zero(), Value::Float(0.0));
        assert_eq!(Builtin::Substr.zero(), s(""));
        assert_eq!(Builtin::Max.zero(), Value::Int(0));
        assert_eq!(Function::Defined.zero(), Value::Int(0));
    }
}
