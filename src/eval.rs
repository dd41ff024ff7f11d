//! Tree-walking evaluator.
//!
//! `eval` takes one AST node and one input `Value` and returns the
//! (possibly empty) stream of output `Value`s as an owned `Vec` —
//! eager rather than lazily generator-based, since the evaluator's
//! contract only fixes the observable output sequence, not how it's
//! produced. Binary operators distribute over their operands' streams
//! by Cartesian product in left-then-right order.
use crate::ast::{Node, ObjectKey};
use crate::error::RuntimeError;
use crate::value::{self, Value};
use crate::value_ops;
use std::rc::Rc;

/// Recursion guard against runaway nesting (pathological filters or
/// deeply self-referential ASTs), not normal input depth.
const MAX_EVAL_DEPTH: usize = 2048;

/// Evaluates `node` against `input`, producing the full output stream.
pub fn eval(node: &Node, input: &Value) -> Result<Vec<Value>, RuntimeError> {
    eval_depth(node, input, 0)
}

fn eval_depth(node: &Node, input: &Value, depth: usize) -> Result<Vec<Value>, RuntimeError> {
    if depth > MAX_EVAL_DEPTH {
        return Err(RuntimeError::type_error(format!(
            "evaluation depth limit exceeded ({MAX_EVAL_DEPTH})"
        )));
    }
    let depth = depth + 1;

    match node {
        Node::Identity { .. } => Ok(vec![input.clone()]),
        Node::Empty { .. } => Ok(vec![]),
        Node::Literal { value, .. } => Ok(vec![value.clone()]),

        Node::RecursiveDescent { .. } => {
            let mut out = Vec::new();
            let mut ancestors = Vec::new();
            recurse(input, &mut out, &mut ancestors);
            Ok(out)
        }

        Node::PropertyAccess {
            property,
            input: sub,
            ..
        } => {
            let inputs = eval_chain_input(sub, input, depth)?;
            let mut out = Vec::with_capacity(inputs.len());
            for v in &inputs {
                match v {
                    Value::Object(fields) => {
                        out.push(
                            fields
                                .iter()
                                .find(|(k, _)| k == property)
                                .map(|(_, v)| v.clone())
                                .unwrap_or(Value::Null),
                        );
                    }
                    Value::Null => out.push(Value::Null),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "Cannot index {} with \"{property}\"",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(out)
        }

        Node::IndexAccess {
            index,
            input: sub,
            ..
        } => {
            let inputs = eval_chain_input(sub, input, depth)?;
            let idxs = eval_depth(index, input, depth)?;
            let mut out = Vec::with_capacity(inputs.len() * idxs.len().max(1));
            for v in &inputs {
                for idx in &idxs {
                    out.push(index_value(v, idx)?);
                }
            }
            Ok(out)
        }

        Node::Slice {
            start,
            end,
            input: sub,
            ..
        } => {
            let inputs = eval_chain_input(sub, input, depth)?;
            let starts = eval_opt_bound(start, input, depth)?;
            let ends = eval_opt_bound(end, input, depth)?;
            let mut out = Vec::new();
            for v in &inputs {
                for s in &starts {
                    for e in &ends {
                        out.push(slice_value(v, *s, *e)?);
                    }
                }
            }
            Ok(out)
        }

        Node::ArrayIteration { input: sub, .. } => {
            let inputs = eval_chain_input(sub, input, depth)?;
            let mut out = Vec::new();
            for v in &inputs {
                match v {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    Value::Object(fields) => out.extend(fields.iter().map(|(_, v)| v.clone())),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "Cannot iterate over {}",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(out)
        }

        Node::Optional { expr, .. } => Ok(eval_depth(expr, input, depth).unwrap_or_default()),

        Node::Pipe { left, right, .. } => {
            let mut out = Vec::new();
            for v in eval_depth(left, input, depth)? {
                out.extend(eval_depth(right, &v, depth)?);
            }
            Ok(out)
        }

        Node::Sequence { exprs, .. } => {
            let mut out = Vec::new();
            for e in exprs {
                out.extend(eval_depth(e, input, depth)?);
            }
            Ok(out)
        }

        Node::ArrayConstruction { elements, .. } => match elements {
            Some(e) => Ok(vec![Value::array(eval_depth(e, input, depth)?)]),
            None => Ok(vec![Value::array(vec![])]),
        },

        Node::ObjectConstruction { fields, .. } => {
            let mut partials: Vec<Vec<(String, Value)>> = vec![Vec::new()];
            for field in fields {
                let mut keys = Vec::new();
                match &field.key {
                    ObjectKey::Name(name) => keys.push(name.clone()),
                    ObjectKey::Expr(expr) => {
                        for kv in eval_depth(expr, input, depth)? {
                            match kv {
                                Value::String(s) => keys.push(s.to_string()),
                                Value::Null => {}
                                other => {
                                    return Err(RuntimeError::type_error(format!(
                                        "Object key must be a string, got {}",
                                        other.type_name()
                                    )));
                                }
                            }
                        }
                    }
                }
                let values = eval_depth(&field.value, input, depth)?;
                let mut next = Vec::with_capacity(partials.len() * keys.len() * values.len());
                for partial in &partials {
                    for k in &keys {
                        for v in &values {
                            let mut extended = partial.clone();
                            extended.push((k.clone(), v.clone()));
                            next.push(extended);
                        }
                    }
                }
                partials = next;
            }
            Ok(partials.into_iter().map(Value::object).collect())
        }

        Node::Sum { left, right, .. } => {
            binary(left, right, input, depth, value_ops::add)
        }
        Node::Difference { left, right, .. } => {
            binary(left, right, input, depth, value_ops::subtract)
        }
        Node::Multiply { left, right, .. } => {
            binary(left, right, input, depth, value_ops::multiply)
        }
        Node::Divide { left, right, .. } => {
            binary(left, right, input, depth, value_ops::divide)
        }
        Node::Modulo { left, right, .. } => {
            binary(left, right, input, depth, value_ops::modulo)
        }

        Node::Equal { l, r, .. } => compare_binary(l, r, input, depth, |a, b| a == b),
        Node::NotEqual { l, r, .. } => compare_binary(l, r, input, depth, |a, b| a != b),
        Node::LessThan { l, r, .. } => {
            compare_binary(l, r, input, depth, |a, b| value::compare_total(a, b).is_lt())
        }
        Node::LessThanOrEqual { l, r, .. } => {
            compare_binary(l, r, input, depth, |a, b| value::compare_total(a, b).is_le())
        }
        Node::GreaterThan { l, r, .. } => {
            compare_binary(l, r, input, depth, |a, b| value::compare_total(a, b).is_gt())
        }
        Node::GreaterThanOrEqual { l, r, .. } => {
            compare_binary(l, r, input, depth, |a, b| value::compare_total(a, b).is_ge())
        }

        Node::And { l, r, .. } => {
            let mut out = Vec::new();
            for lv in eval_depth(l, input, depth)? {
                if lv.is_truthy() {
                    for rv in eval_depth(r, input, depth)? {
                        out.push(Value::Bool(rv.is_truthy()));
                    }
                } else {
                    out.push(Value::Bool(false));
                }
            }
            Ok(out)
        }
        Node::Or { l, r, .. } => {
            let mut out = Vec::new();
            for lv in eval_depth(l, input, depth)? {
                if lv.is_truthy() {
                    out.push(Value::Bool(true));
                } else {
                    for rv in eval_depth(r, input, depth)? {
                        out.push(Value::Bool(rv.is_truthy()));
                    }
                }
            }
            Ok(out)
        }
        Node::Not { expr, .. } => Ok(eval_depth(expr, input, depth)?
            .into_iter()
            .map(|v| Value::Bool(!v.is_truthy()))
            .collect()),

        Node::Default { l, r, .. } => {
            let lv = eval_depth(l, input, depth)?;
            let truthy: Vec<Value> = lv.into_iter().filter(Value::is_truthy).collect();
            if truthy.is_empty() {
                eval_depth(r, input, depth)
            } else {
                Ok(truthy)
            }
        }

        Node::Conditional {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            let mut out = Vec::new();
            for c in eval_depth(condition, input, depth)? {
                if c.is_truthy() {
                    out.extend(eval_depth(then_branch, input, depth)?);
                } else {
                    out.extend(eval_depth(else_branch, input, depth)?);
                }
            }
            Ok(out)
        }

        Node::MapFilter { filter, .. } => match input {
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.iter() {
                    out.extend(eval_depth(filter, item, depth)?);
                }
                Ok(vec![Value::array(out)])
            }
            Value::Object(fields) => {
                let mut out = Vec::new();
                for (_, v) in fields.iter() {
                    out.extend(eval_depth(filter, v, depth)?);
                }
                Ok(vec![Value::array(out)])
            }
            other => Err(RuntimeError::type_error(format!(
                "Cannot map over {}",
                other.type_name()
            ))),
        },

        Node::MapValuesFilter { filter, .. } => match input {
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.iter() {
                    if let Some(first) = eval_depth(filter, item, depth)?.into_iter().next() {
                        out.push(first);
                    }
                }
                Ok(vec![Value::array(out)])
            }
            Value::Object(fields) => {
                let mut out = Vec::new();
                for (k, v) in fields.iter() {
                    if let Some(first) = eval_depth(filter, v, depth)?.into_iter().next() {
                        out.push((k.clone(), first));
                    }
                }
                Ok(vec![Value::object(out)])
            }
            other => Err(RuntimeError::type_error(format!(
                "Cannot map over {}",
                other.type_name()
            ))),
        },

        Node::SelectFilter { condition, .. } => {
            let matched = eval_depth(condition, input, depth)?
                .iter()
                .any(Value::is_truthy);
            if matched {
                Ok(vec![input.clone()])
            } else {
                Ok(vec![])
            }
        }

        Node::Sort { .. } => match input {
            Value::Array(items) => {
                let mut sorted = items.as_ref().clone();
                sorted.sort_by(value::compare_total);
                Ok(vec![Value::array(sorted)])
            }
            other => Err(RuntimeError::type_error(format!(
                "Cannot sort {}",
                other.type_name()
            ))),
        },

        Node::SortBy { paths, .. } => match input {
            Value::Array(items) => {
                let mut keyed = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let mut key = Vec::with_capacity(paths.len());
                    for p in paths {
                        key.push(
                            eval_depth(p, item, depth)?
                                .into_iter()
                                .next()
                                .unwrap_or(Value::Null),
                        );
                    }
                    keyed.push((key, item.clone()));
                }
                keyed.sort_by(|(a, _), (b, _)| {
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| value::compare_total(x, y))
                        .find(|o| !o.is_eq())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(vec![Value::array(keyed.into_iter().map(|(_, v)| v).collect())])
            }
            other => Err(RuntimeError::type_error(format!(
                "Cannot sort {}",
                other.type_name()
            ))),
        },

        Node::Keys { .. } => match input {
            Value::Object(fields) => {
                let mut keys: Vec<Value> = fields.iter().map(|(k, _)| Value::string(k.clone())).collect();
                keys.sort_by(value::compare_total);
                Ok(vec![Value::array(keys)])
            }
            Value::Array(items) => Ok(vec![Value::array(
                (0..items.len()).map(|i| Value::Number(i as f64)).collect(),
            )]),
            _ => Ok(vec![Value::array(vec![])]),
        },

        Node::KeysUnsorted { .. } => match input {
            Value::Object(fields) => Ok(vec![Value::array(
                fields.iter().map(|(k, _)| Value::string(k.clone())).collect(),
            )]),
            Value::Array(items) => Ok(vec![Value::array(
                (0..items.len()).map(|i| Value::Number(i as f64)).collect(),
            )]),
            _ => Ok(vec![Value::array(vec![])]),
        },

        Node::Tostring { .. } => match input {
            Value::String(_) => Ok(vec![input.clone()]),
            other => Ok(vec![Value::string(value::to_json_string(other))]),
        },

        Node::Tonumber { .. } => match input {
            Value::Number(_) => Ok(vec![input.clone()]),
            Value::String(s) => s
                .parse::<f64>()
                .map(|n| vec![Value::Number(n)])
                .map_err(|_| RuntimeError::type_error(format!("Cannot parse '{s}' as number"))),
            other => Err(RuntimeError::type_error(format!(
                "Cannot parse {} as number",
                other.type_name()
            ))),
        },

        Node::Length { .. } => match input {
            Value::Null => Ok(vec![Value::Number(0.0)]),
            Value::Number(n) => Ok(vec![Value::Number(n.abs())]),
            Value::String(s) => Ok(vec![Value::Number(s.chars().count() as f64)]),
            Value::Array(items) => Ok(vec![Value::Number(items.len() as f64)]),
            Value::Object(fields) => Ok(vec![Value::Number(fields.len() as f64)]),
            Value::Bool(_) => Err(RuntimeError::type_error("boolean has no length")),
        },

        Node::HasKey { key, .. } => {
            let keys = eval_depth(key, input, depth)?;
            let mut out = Vec::with_capacity(keys.len());
            for k in &keys {
                out.push(Value::Bool(has_key(input, k)?));
            }
            Ok(out)
        }
    }
}

/// Evaluates a chain node's optional `input` sub-expression, falling
/// back to the ambient input when it's `None` (the node is the head of
/// a chain, e.g. the bare `.` before `.foo`).
fn eval_chain_input(
    sub: &Option<Box<Node>>,
    input: &Value,
    depth: usize,
) -> Result<Vec<Value>, RuntimeError> {
    match sub {
        Some(node) => eval_depth(node, input, depth),
        None => Ok(vec![input.clone()]),
    }
}

fn eval_opt_bound(
    bound: &Option<Box<Node>>,
    input: &Value,
    depth: usize,
) -> Result<Vec<Option<f64>>, RuntimeError> {
    match bound {
        None => Ok(vec![None]),
        Some(node) => {
            let mut out = Vec::new();
            for v in eval_depth(node, input, depth)? {
                match v {
                    Value::Number(n) => out.push(Some(n)),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "Slice bound must be a number, got {}",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(out)
        }
    }
}

fn binary(
    left: &Node,
    right: &Node,
    input: &Value,
    depth: usize,
    op: fn(&Value, &Value) -> Result<Value, RuntimeError>,
) -> Result<Vec<Value>, RuntimeError> {
    let ls = eval_depth(left, input, depth)?;
    let rs = eval_depth(right, input, depth)?;
    let mut out = Vec::with_capacity(ls.len() * rs.len().max(1));
    for l in &ls {
        for r in &rs {
            out.push(op(l, r)?);
        }
    }
    Ok(out)
}

fn compare_binary(
    left: &Node,
    right: &Node,
    input: &Value,
    depth: usize,
    op: fn(&Value, &Value) -> bool,
) -> Result<Vec<Value>, RuntimeError> {
    let ls = eval_depth(left, input, depth)?;
    let rs = eval_depth(right, input, depth)?;
    let mut out = Vec::with_capacity(ls.len() * rs.len().max(1));
    for l in &ls {
        for r in &rs {
            out.push(Value::Bool(op(l, r)));
        }
    }
    Ok(out)
}

fn normalize_index(i: f64, len: usize) -> Option<usize> {
    if i.fract() != 0.0 {
        return None;
    }
    let idx = if i < 0.0 { len as i64 + i as i64 } else { i as i64 };
    if idx < 0 || idx as usize >= len {
        None
    } else {
        Some(idx as usize)
    }
}

fn index_value(v: &Value, idx: &Value) -> Result<Value, RuntimeError> {
    match (v, idx) {
        (Value::Array(items), Value::Number(n)) => {
            if n.fract() != 0.0 {
                return Err(RuntimeError::index_error("array index must be an integer"));
            }
            Ok(normalize_index(*n, items.len())
                .map(|i| items[i].clone())
                .unwrap_or(Value::Null))
        }
        (Value::Null, Value::Number(_)) => Ok(Value::Null),
        (Value::Object(_), Value::Number(_)) => {
            Err(RuntimeError::index_error("cannot index object with number"))
        }
        (other, Value::Number(_)) => Err(RuntimeError::type_error(format!(
            "Cannot index {} with number",
            other.type_name()
        ))),
        (other, idx) => Err(RuntimeError::type_error(format!(
            "Cannot index {} with {}",
            other.type_name(),
            idx.type_name()
        ))),
    }
}

fn clamp_bound(n: Option<f64>, len: usize, default: usize) -> usize {
    match n {
        None => default,
        Some(n) => {
            let n = if n < 0.0 { (len as f64 + n).max(0.0) } else { n };
            (n as usize).min(len)
        }
    }
}

fn slice_value(v: &Value, start: Option<f64>, end: Option<f64>) -> Result<Value, RuntimeError> {
    match v {
        Value::Array(items) => {
            let lo = clamp_bound(start, items.len(), 0);
            let hi = clamp_bound(end, items.len(), items.len());
            if lo >= hi {
                Ok(Value::array(vec![]))
            } else {
                Ok(Value::array(items[lo..hi].to_vec()))
            }
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let lo = clamp_bound(start, chars.len(), 0);
            let hi = clamp_bound(end, chars.len(), chars.len());
            if lo >= hi {
                Ok(Value::string(""))
            } else {
                Ok(Value::string(chars[lo..hi].iter().collect::<String>()))
            }
        }
        Value::Null => Ok(Value::Null),
        other => Err(RuntimeError::type_error(format!(
            "Cannot slice {}",
            other.type_name()
        ))),
    }
}

fn has_key(input: &Value, key: &Value) -> Result<bool, RuntimeError> {
    match (input, key) {
        (Value::Object(fields), Value::String(k)) => {
            Ok(fields.iter().any(|(ek, _)| ek.as_str() == k.as_ref()))
        }
        (Value::Array(items), Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => {
            Ok((*n as usize) < items.len())
        }
        (Value::Null, _) => Ok(false),
        _ => Err(RuntimeError::key_error(
            "has() requires a string key for objects or a non-negative integer for arrays",
        )),
    }
}

/// Pre-order depth-first traversal for `..`, skipping any array/object
/// already on the current path (cycle guard for graph-shaped values;
/// a no-op for ordinary tree-shaped JSON).
fn recurse(value: &Value, out: &mut Vec<Value>, ancestors: &mut Vec<usize>) {
    out.push(value.clone());
    match value {
        Value::Array(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            if ancestors.contains(&ptr) {
                return;
            }
            ancestors.push(ptr);
            for item in items.iter() {
                recurse(item, out, ancestors);
            }
            ancestors.pop();
        }
        Value::Object(fields) => {
            let ptr = Rc::as_ptr(fields) as usize;
            if ancestors.contains(&ptr) {
                return;
            }
            ancestors.push(ptr);
            for (_, v) in fields.iter() {
                recurse(v, out, ancestors);
            }
            ancestors.pop();
        }
        _ => {}
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::parser::parse;
    use proptest::collection::vec as prop_vec;
    use proptest::prelude::*;

    fn run(src: &str, input: Value) -> Vec<Value> {
        let ast = parse(src).unwrap();
        eval(&ast, &input).unwrap()
    }

    fn run_sort(input: &Value) -> Value {
        run("sort", input.clone()).into_iter().next().unwrap()
    }

    proptest! {
        #[test]
        fn sort_is_idempotent(nums in prop_vec(-1000i32..1000, 0..20)) {
            let input = Value::array(nums.into_iter().map(|n| Value::Number(n as f64)).collect());
            let once = run_sort(&input);
            let twice = run_sort(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn multi_value_distributivity_holds(
            ls in prop_vec(-100i32..100, 1..5),
            rs in prop_vec(-100i32..100, 1..5),
        ) {
            let l = ls.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
            let r = rs.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
            let out = run(&format!("({l}) + ({r})"), Value::Null);
            prop_assert_eq!(out.len(), ls.len() * rs.len());
        }
    }
}
