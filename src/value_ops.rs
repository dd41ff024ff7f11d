//! Arithmetic coercion rules for `+`, `-`, `*`, `/`, `%`.
//!
//! Each operator is a total function from a pair of `Value`s to a
//! `Result<Value, RuntimeError>` — no implicit numeric promotion beyond
//! what's spelled out below, and no silent truncation.
use crate::error::RuntimeError;
use crate::value::Value;
use std::rc::Rc;

fn type_error(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "{op} cannot be applied to {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

/// `null` acts as the identity operand; arrays concatenate; objects merge
/// with the right side winning on key collision; numbers add; strings
/// concatenate. Any other pairing is a type error.
pub fn add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.clone()),
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::String(x), Value::String(y)) => {
            Ok(Value::string(format!("{x}{y}")))
        }
        (Value::Array(x), Value::Array(y)) => {
            let mut merged = x.as_ref().clone();
            merged.extend(y.as_ref().iter().cloned());
            Ok(Value::Array(Rc::new(merged)))
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut merged = x.as_ref().clone();
            for (k, v) in y.iter() {
                match merged.iter_mut().find(|(ek, _)| ek == k) {
                    Some(entry) => entry.1 = v.clone(),
                    None => merged.push((k.clone(), v.clone())),
                }
            }
            Ok(Value::Object(Rc::new(merged)))
        }
        _ => Err(type_error("+", a, b)),
    }
}

/// Numbers subtract, with `null` standing in for `0` on either side.
/// Arrays drop every left-hand element that occurs anywhere in the
/// right-hand array. Objects drop every left-hand key present in the
/// right-hand object. Anything else is a type error.
pub fn subtract(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x - y)),
        (Value::Null, Value::Number(y)) => Ok(Value::Number(-y)),
        (Value::Number(x), Value::Null) => Ok(Value::Number(*x)),
        (Value::Array(x), Value::Array(y)) => {
            let kept: Vec<Value> = x
                .iter()
                .filter(|item| !y.iter().any(|excluded| *item == excluded))
                .cloned()
                .collect();
            Ok(Value::array(kept))
        }
        (Value::Object(x), Value::Object(y)) => {
            let kept: Vec<(String, Value)> = x
                .iter()
                .filter(|(k, _)| !y.iter().any(|(ek, _)| ek == k))
                .cloned()
                .collect();
            Ok(Value::object(kept))
        }
        _ => Err(type_error("-", a, b)),
    }
}

/// Numbers multiply, with `null` standing in for `0`. A string times a
/// non-negative integer repeats the string that many times. Anything
/// else is a type error.
pub fn multiply(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x * y)),
        (Value::Null, Value::Number(y)) => Ok(Value::Number(0.0 * y)),
        (Value::Number(x), Value::Null) => Ok(Value::Number(x * 0.0)),
        (Value::Null, Value::Null) => Ok(Value::Number(0.0)),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            repeat_string(s, *n, a, b)
        }
        (Value::String(s), Value::Null) | (Value::Null, Value::String(s)) => {
            repeat_string(s, 0.0, a, b)
        }
        _ => Err(type_error("*", a, b)),
    }
}

fn repeat_string(s: &str, n: f64, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if n.fract() != 0.0 || n < 0.0 {
        return Err(type_error("*", a, b));
    }
    Ok(Value::string(s.repeat(n as usize)))
}

/// Numbers divide; division by zero is a `NumericError` rather than
/// IEEE-754 `NaN`, so a stray `/0` surfaces as an error a caller can
/// match on instead of silently poisoning downstream comparisons.
pub fn divide(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if *y == 0.0 {
                Err(RuntimeError::numeric_error(format!("{x} and {y}: division by zero")))
            } else {
                Ok(Value::Number(x / y))
            }
        }
        _ => Err(type_error("/", a, b)),
    }
}

/// Mathematical modulo: the result's sign matches the divisor's, not the
/// dividend's (unlike Rust's `%`). Modulo by zero is a `NumericError`.
pub fn modulo(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if *y == 0.0 {
                Err(RuntimeError::numeric_error(format!("{x} and {y}: modulo by zero")))
            } else {
                let r = x % y;
                let result = if r != 0.0 && (r < 0.0) != (*y < 0.0) { r + y } else { r };
                Ok(Value::Number(result))
            }
        }
        _ => Err(type_error("%", a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_numbers() {
        assert_eq!(add(&Value::Number(1.0), &Value::Number(2.0)).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn add_null_identity() {
        assert_eq!(add(&Value::Null, &Value::Number(5.0)).unwrap(), Value::Number(5.0));
        assert_eq!(add(&Value::Number(5.0), &Value::Null).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn add_strings() {
        assert_eq!(add(&Value::string("a"), &Value::string("b")).unwrap(), Value::string("ab"));
    }

    #[test]
    fn add_arrays_concatenates() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(2.0)]);
        assert_eq!(
            add(&a, &b).unwrap(),
            Value::array(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn add_objects_right_wins() {
        let a = Value::object(vec![("x".into(), Value::Number(1.0))]);
        let b = Value::object(vec![("x".into(), Value::Number(2.0)), ("y".into(), Value::Number(3.0))]);
        assert_eq!(
            add(&a, &b).unwrap(),
            Value::object(vec![("x".into(), Value::Number(2.0)), ("y".into(), Value::Number(3.0))])
        );
    }

    #[test]
    fn add_mismatched_types_errors() {
        assert!(add(&Value::array(vec![]), &Value::Number(1.0)).is_err());
    }

    #[test]
    fn subtract_arrays_removes_occurrences() {
        let a = Value::array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);
        assert_eq!(subtract(&a, &b).unwrap(), Value::array(vec![Value::Number(2.0)]));
    }

    #[test]
    fn subtract_objects_removes_keys() {
        let a = Value::object(vec![("x".into(), Value::Number(1.0)), ("y".into(), Value::Number(2.0))]);
        let b = Value::object(vec![("x".into(), Value::Null)]);
        assert_eq!(subtract(&a, &b).unwrap(), Value::object(vec![("y".into(), Value::Number(2.0))]));
    }

    #[test]
    fn subtract_null_as_zero() {
        assert_eq!(subtract(&Value::Null, &Value::Number(3.0)).unwrap(), Value::Number(-3.0));
    }

    #[test]
    fn multiply_string_repeat() {
        assert_eq!(multiply(&Value::string("ab"), &Value::Number(3.0)).unwrap(), Value::string("ababab"));
    }

    #[test]
    fn multiply_negative_repeat_errors() {
        assert!(multiply(&Value::string("ab"), &Value::Number(-1.0)).is_err());
    }

    #[test]
    fn divide_by_zero_is_numeric_error() {
        assert!(divide(&Value::Number(1.0), &Value::Number(0.0)).is_err());
    }

    #[test]
    fn divide_numbers() {
        assert_eq!(divide(&Value::Number(6.0), &Value::Number(2.0)).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn modulo_sign_matches_divisor() {
        assert_eq!(modulo(&Value::Number(-7.0), &Value::Number(3.0)).unwrap(), Value::Number(2.0));
        assert_eq!(modulo(&Value::Number(7.0), &Value::Number(-3.0)).unwrap(), Value::Number(-2.0));
    }

    #[test]
    fn modulo_by_zero_is_numeric_error() {
        assert!(modulo(&Value::Number(1.0), &Value::Number(0.0)).is_err());
    }
}
