//! Converting decoded argument values to declared parameter types.

use std::sync::Arc;

use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{IntKind, ObjectRef, TypeRegistry, ValueType};
use monitor_types::token::{Token, TokenKind};
use monitor_types::value::Value;

/// Finds objects by name when a string argument stands for a peripheral,
/// group or external.
pub trait ObjectLookup {
    fn find_object(&self, name: &str) -> Option<ObjectRef>;
}

/// A lookup that knows no objects.
pub struct NoObjects;

impl ObjectLookup for NoObjects {
    fn find_object(&self, _name: &str) -> Option<ObjectRef> {
        None
    }
}

/// Whether a token of this kind may feed a parameter of type `ty` at all.
pub fn token_acceptable(token: &Token, ty: &ValueType) -> bool {
    match ty {
        ValueType::String => matches!(
            token.kind(),
            TokenKind::StringLiteral(_) | TokenKind::PathLiteral(_)
        ),
        ValueType::Int(_) => matches!(token.kind(), TokenKind::Integer(_)),
        ValueType::Bool => matches!(token.kind(), TokenKind::Boolean(_)),
        ValueType::Nullable(inner) => is_null_literal(token) || token_acceptable(token, inner),
        _ => true,
    }
}

pub fn is_null_literal(token: &Token) -> bool {
    matches!(token.kind(), TokenKind::Literal(s) if s == "null")
}

/// The value a token contributes as an argument: `null` becomes
/// [`Value::Null`], everything else its decoded value.
pub fn decode(token: &Token) -> Value {
    if is_null_literal(token) {
        Value::Null
    } else {
        token.value()
    }
}

/// Convert `value` to `ty`, failing with a conversion error.
pub fn coerce(
    value: Value,
    ty: &ValueType,
    types: &TypeRegistry,
    lookup: &dyn ObjectLookup,
) -> Result<Value> {
    if let ValueType::Any = ty {
        return Ok(value);
    }
    if value.is_null() {
        return if ty.accepts_null() {
            Ok(Value::Null)
        } else {
            Err(MonitorError::Conversion(format!("Cannot convert null to {ty}")))
        };
    }

    match (ty, value) {
        (ValueType::Nullable(inner), value) => coerce(value, inner, types, lookup),
        (ValueType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        // 64-bit hexadecimal literals arrive as their signed bit pattern.
        (ValueType::Int(IntKind::U64), Value::Int(i)) => Ok(Value::Int(i)),
        (ValueType::Int(kind), Value::Int(i)) => in_range(i128::from(i), *kind),
        (ValueType::Int(kind), Value::Enum { value, .. }) => in_range(i128::from(value), *kind),
        (ValueType::Int(kind), Value::Float(f)) => {
            if !f.is_finite() {
                return Err(MonitorError::Conversion(format!(
                    "Value {f} cannot be represented as {}",
                    kind.name()
                )));
            }
            let truncated = f.trunc();
            if truncated < kind.min() as f64 || truncated > kind.max() as f64 {
                return Err(out_of_range(&f.to_string(), *kind));
            }
            in_range(truncated as i128, *kind)
        }
        (ValueType::Float, Value::Float(f)) => Ok(Value::Float(f)),
        (ValueType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (ValueType::String, Value::String(s)) => Ok(Value::String(s)),
        (ValueType::Range, Value::Range { start, end }) => Ok(Value::Range { start, end }),
        (ValueType::Enum(spec), Value::String(name)) => match spec.value_of(&name) {
            Some(value) => Ok(Value::Enum {
                spec: Arc::clone(spec),
                value,
            }),
            None => Err(undefined_enum(&name, &spec.name)),
        },
        (ValueType::Enum(spec), Value::Int(value)) => {
            if spec.flags || spec.is_defined(value) {
                Ok(Value::Enum {
                    spec: Arc::clone(spec),
                    value,
                })
            } else {
                Err(undefined_enum(&value.to_string(), &spec.name))
            }
        }
        (ValueType::Enum(spec), Value::Enum { spec: other, value }) if other.name == spec.name => {
            Ok(Value::Enum { spec: other, value })
        }
        (ValueType::Object(filter), Value::Object(object)) => {
            check_object(object, *filter, types, ty)
        }
        (ValueType::Object(filter), Value::String(name)) => match lookup.find_object(&name) {
            Some(object) => check_object(object, *filter, types, ty),
            None => Err(MonitorError::Conversion(format!(
                "Cannot convert {name} to {ty}: no such peripheral or external"
            ))),
        },
        (ValueType::Array(element), Value::List(items)) => items
            .into_iter()
            .map(|item| coerce(item, element, types, lookup))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        (ty, value) => Err(MonitorError::Conversion(format!(
            "Cannot convert {} value '{value}' to {ty}",
            value.kind_name()
        ))),
    }
}

fn in_range(value: i128, kind: IntKind) -> Result<Value> {
    if value < kind.min() || value > kind.max() {
        return Err(out_of_range(&value.to_string(), kind));
    }
    // u64 values above i64::MAX keep their bit pattern.
    Ok(Value::Int(value as i64))
}

fn out_of_range(value: &str, kind: IntKind) -> MonitorError {
    MonitorError::Conversion(format!("Value {value} is out of range for {}", kind.name()))
}

fn undefined_enum(value: &str, name: &str) -> MonitorError {
    MonitorError::Conversion(format!("Enum value {value} is not defined for {name}!"))
}

fn check_object(
    object: ObjectRef,
    filter: Option<&str>,
    types: &TypeRegistry,
    ty: &ValueType,
) -> Result<Value> {
    match filter {
        Some(name) if !types.is_instance(&*object, name) => Err(MonitorError::Conversion(format!(
            "Cannot convert {} to {ty}",
            types.type_name(&*object)
        ))),
        _ => Ok(Value::Object(object)),
    }
}
