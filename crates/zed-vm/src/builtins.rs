//! Builtin functions, dispatched by id from the `builtin` opcode.

use zed_codegen::isa::Builtin;

use crate::error::{VmError, VmResult};
use crate::value::{Num, Value};
use crate::vm::Vm;

/// Call a builtin. Arguments arrive in natural order; the result is pushed
/// by the caller.
pub(crate) fn call(
    vm: &mut Vm,
    builtin: Builtin,
    args: Vec<Value>,
    offset: u16,
) -> VmResult<Value> {
    match builtin {
        // `print` is variadic: arguments joined by `@ocs`, appended to the
        // output buffer.
        Builtin::Print => {
            let text = join_args(&args, vm.globals.ocs);
            vm.write_out(&text);
            Ok(Value::Nil)
        }
        Builtin::Len => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            match &value {
                Value::Str(s) => Ok(Value::Uint(s.chars().count() as u64)),
                Value::List(items) => Ok(Value::Uint(items.borrow().len() as u64)),
                Value::Map(entries) => Ok(Value::Uint(entries.borrow().len() as u64)),
                other => Err(type_error(builtin, other, offset)),
            }
        }
        Builtin::Str => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            Ok(Value::Str(value.to_string()))
        }
        // Numeric coercion; yields nil when the value does not parse.
        Builtin::Num => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            Ok(match value.as_num() {
                Some(Num::Int(v)) => Value::Int(v),
                Some(Num::Uint(v)) => Value::Uint(v),
                Some(Num::Float(v)) => Value::Float(v),
                None => Value::Nil,
            })
        }
        Builtin::Int => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            match value.as_num() {
                Some(Num::Int(v)) => Ok(Value::Int(v)),
                Some(Num::Uint(v)) => Ok(Value::Int(v as i64)),
                Some(Num::Float(v)) => Ok(Value::Int(v as i64)),
                None => Err(type_error(builtin, &value, offset)),
            }
        }
        Builtin::Split => {
            let [value, sep] = fixed::<2>(builtin, args, offset)?;
            let text = value.to_string();
            let sep = sep.to_string();
            let parts: Vec<Value> = if sep.is_empty() {
                text.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                text.split(&sep).map(|p| Value::Str(p.to_string())).collect()
            };
            Ok(Value::list(parts))
        }
        Builtin::Join => {
            let [value, sep] = fixed::<2>(builtin, args, offset)?;
            let Value::List(items) = &value else {
                return Err(type_error(builtin, &value, offset));
            };
            let sep = sep.to_string();
            let text = items
                .borrow()
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Value::Str(text))
        }
        Builtin::Substr => {
            let [value, start, len] = fixed::<3>(builtin, args, offset)?;
            let text = value.to_string();
            let start = index_arg(builtin, &start, offset)?;
            let len = index_arg(builtin, &len, offset)?;
            let result: String = text.chars().skip(start).take(len).collect();
            Ok(Value::Str(result))
        }
        Builtin::Contains => {
            let [haystack, needle] = fixed::<2>(builtin, args, offset)?;
            let found = match &haystack {
                Value::Str(s) => s.contains(&needle.to_string()),
                Value::List(items) => items.borrow().iter().any(|v| *v == needle),
                Value::Map(entries) => entries.borrow().contains_key(&needle.to_string()),
                other => return Err(type_error(builtin, other, offset)),
            };
            Ok(Value::Bool(found))
        }
        Builtin::Upper => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            Ok(Value::Str(value.to_string().to_uppercase()))
        }
        Builtin::Lower => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            Ok(Value::Str(value.to_string().to_lowercase()))
        }
        Builtin::Trim => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            Ok(Value::Str(value.to_string().trim().to_string()))
        }
        // Appends in place and returns the list, so pushes chain.
        Builtin::Push => {
            let [value, item] = fixed::<2>(builtin, args, offset)?;
            let Value::List(items) = &value else {
                return Err(type_error(builtin, &value, offset));
            };
            items.borrow_mut().push(item);
            Ok(value)
        }
        Builtin::Keys => {
            let [value] = fixed::<1>(builtin, args, offset)?;
            let Value::Map(entries) = &value else {
                return Err(type_error(builtin, &value, offset));
            };
            let keys = entries
                .borrow()
                .keys()
                .map(|k| Value::Str(k.clone()))
                .collect();
            Ok(Value::list(keys))
        }
    }
}

/// Stringify and join arguments with the output column separator
/// (`print` and `sprint`).
pub(crate) fn join_args(args: &[Value], ocs: u8) -> String {
    let mut text = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            text.push(ocs as char);
        }
        text.push_str(&arg.to_string());
    }
    text
}

/// Apply an interpolation format spec: `[<|>][width][.precision]`.
///
/// Unknown spec characters are ignored — formatting is best-effort, never
/// an error.
pub(crate) fn format_value(value: &Value, spec: &str) -> String {
    let mut chars = spec.chars().peekable();
    let right_align = match chars.peek() {
        Some('>') => {
            chars.next();
            true
        }
        Some('<') => {
            chars.next();
            false
        }
        _ => false,
    };

    let mut width = 0usize;
    while let Some(c) = chars.peek().copied() {
        if let Some(d) = c.to_digit(10) {
            width = width * 10 + d as usize;
            chars.next();
        } else {
            break;
        }
    }

    let mut precision = None;
    if chars.peek() == Some(&'.') {
        chars.next();
        let mut p = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            p = p * 10 + d as usize;
            chars.next();
        }
        precision = Some(p);
    }

    let text = match (precision, value.as_num()) {
        (Some(p), Some(num)) => format!("{:.p$}", num.as_f64(), p = p),
        _ => value.to_string(),
    };

    if text.chars().count() >= width {
        return text;
    }
    let pad = width - text.chars().count();
    if right_align {
        format!("{}{}", " ".repeat(pad), text)
    } else {
        format!("{}{}", text, " ".repeat(pad))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Exact-arity extraction.
fn fixed<const N: usize>(
    builtin: Builtin,
    args: Vec<Value>,
    offset: u16,
) -> VmResult<[Value; N]> {
    let got = args.len();
    args.try_into().map_err(|_| VmError::Arity {
        builtin: builtin.name(),
        expected: N,
        got,
        offset,
    })
}

fn index_arg(builtin: Builtin, value: &Value, offset: u16) -> VmResult<usize> {
    value
        .as_index()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| VmError::TypeMismatch {
            message: format!("{} expects a non-negative integer, got {value}", builtin.name()),
            offset,
        })
}

fn type_error(builtin: Builtin, value: &Value, offset: u16) -> VmError {
    VmError::TypeMismatch {
        message: format!("{} cannot accept a {}", builtin.name(), value.type_name()),
        offset,
    }
}
