//! Device actions: calling methods and accessing properties, fields and
//! indexers through member tables.

use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{
    FieldDescriptor, IndexerDescriptor, MethodDescriptor, ObjectRef, PropertyDescriptor,
    TypeInfo, TypeRegistry, ValueType,
};
use monitor_types::token::{Token, TokenKind};
use monitor_types::value::Value;

use crate::coerce::{ObjectLookup, coerce, decode, token_acceptable};

/// The value of an action together with its declared type, which drives
/// number formatting.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub value: Value,
    pub ty: ValueType,
}

impl ActionResult {
    fn unit() -> Self {
        Self {
            value: Value::Null,
            ty: ValueType::Void,
        }
    }
}

/// Runs one action against one object.
pub struct ActionInvoker<'a> {
    pub types: &'a TypeRegistry,
    pub lookup: &'a dyn ObjectLookup,
}

impl ActionInvoker<'_> {
    /// `args` starts with the member name, or with `[` for the default
    /// indexer.
    pub fn invoke(&self, object: &ObjectRef, target: &str, args: &[Token]) -> Result<ActionResult> {
        let info = self.types.type_of(&**object);
        let (member, rest) = split_member(info.as_deref(), target, args)?;
        log::debug!("invoking {target}.{member} with {} argument(s)", rest.len());

        let methods: Vec<&MethodDescriptor> = info
            .as_deref()
            .map(|i| i.methods_named(member).collect())
            .unwrap_or_default();
        let extensions: Vec<&MethodDescriptor> = self
            .types
            .extensions_of(&**object)
            .iter()
            .filter(|m| m.name == member)
            .collect();
        if !methods.is_empty() || !extensions.is_empty() {
            for candidates in [methods, extensions] {
                if let Some(result) = self.call_overloaded(object, candidates, rest)? {
                    return Ok(result);
                }
            }
            return Err(MonitorError::ParametersMismatch {
                member: member.to_string(),
            });
        }

        if let Some(info) = info.as_deref() {
            if let Some(field) = info.field(member) {
                return self.access_field(object, target, field, rest);
            }
            if let Some(property) = info.property(member) {
                return self.access_property(object, target, property, rest);
            }
            let indexers: Vec<&IndexerDescriptor> = info.indexers_named(member).collect();
            if !indexers.is_empty() {
                return self.access_indexer(object, target, &indexers, rest);
            }
        }
        Err(MonitorError::NoSuchMember {
            target: target.to_string(),
            member: member.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Methods
    // -----------------------------------------------------------------------

    /// Try candidates in overload order. `None` when none accepts `args`.
    fn call_overloaded(
        &self,
        object: &ObjectRef,
        mut candidates: Vec<&MethodDescriptor>,
        args: &[Token],
    ) -> Result<Option<ActionResult>> {
        candidates.sort_by_key(|m| (m.params.len(), m.string_param_count()));

        for (index, method) in candidates.iter().enumerate() {
            let Some(values) = self.prepare(method, args) else {
                continue;
            };
            if let Some(rival) = candidates[index + 1..].iter().find(|other| {
                other.owner == method.owner
                    && same_parameter_types(method, other)
                    && self.prepare(other, args).is_some()
            }) {
                return Err(MonitorError::AmbiguousOverload {
                    owner: method.owner.clone(),
                    first: method.to_string(),
                    second: rival.to_string(),
                });
            }
            log::debug!("selected {}", method.signature());
            let value = (method.call)(object, &values)?;
            return Ok(Some(ActionResult {
                value,
                ty: method.ret.clone(),
            }));
        }
        Ok(None)
    }

    /// Converted arguments for `method`, or `None` when it does not accept
    /// `args`.
    fn prepare(&self, method: &MethodDescriptor, args: &[Token]) -> Option<Vec<Value>> {
        let fixed = if method.variadic {
            method.params.len() - 1
        } else {
            method.params.len()
        };
        if !method.variadic && args.len() > fixed {
            return None;
        }

        let mut values = Vec::with_capacity(method.params.len());
        for (i, param) in method.params[..fixed].iter().enumerate() {
            let value = match args.get(i) {
                Some(token) => self.convert_token(token, &param.ty)?,
                None => param.default.clone()?,
            };
            if let Some(allowed) = &param.allowed
                && !allowed.contains(&value)
            {
                return None;
            }
            values.push(value);
        }

        if method.variadic {
            let element = match method.params.last().map(|p| &p.ty) {
                Some(ValueType::Array(element)) => element.as_ref(),
                _ => return None,
            };
            let rest = args
                .get(fixed..)
                .unwrap_or_default()
                .iter()
                .map(|token| self.convert_token(token, element))
                .collect::<Option<Vec<_>>>()?;
            values.push(Value::List(rest));
        }
        Some(values)
    }

    fn convert_token(&self, token: &Token, ty: &ValueType) -> Option<Value> {
        if !token_acceptable(token, ty) {
            return None;
        }
        coerce(decode(token), ty, self.types, self.lookup).ok()
    }

    // -----------------------------------------------------------------------
    // Fields, properties, indexers
    // -----------------------------------------------------------------------

    fn convert_value(&self, token: &Token, ty: &ValueType) -> Result<Value> {
        if !token_acceptable(token, ty) {
            return Err(MonitorError::Conversion(format!(
                "Cannot use {} {} as {ty}",
                token.kind().name(),
                token.raw()
            )));
        }
        coerce(decode(token), ty, self.types, self.lookup)
    }

    fn access_field(
        &self,
        object: &ObjectRef,
        target: &str,
        field: &FieldDescriptor,
        args: &[Token],
    ) -> Result<ActionResult> {
        let Some(token) = args.first() else {
            let value = (field.get)(object)?;
            return Ok(ActionResult {
                value,
                ty: field.ty.clone(),
            });
        };
        let Some(set) = &field.set else {
            return Err(MonitorError::ReadOnlyMember(format!("{target}.{}", field.name)));
        };
        set(object, self.convert_value(token, &field.ty)?)?;
        Ok(ActionResult::unit())
    }

    fn access_property(
        &self,
        object: &ObjectRef,
        target: &str,
        property: &PropertyDescriptor,
        args: &[Token],
    ) -> Result<ActionResult> {
        match args.first() {
            None => {
                let Some(get) = &property.get else {
                    return Err(MonitorError::recoverable(format!(
                        "Could not execute this action on property {}",
                        property.name
                    )));
                };
                Ok(ActionResult {
                    value: get(object)?,
                    ty: property.ty.clone(),
                })
            }
            Some(token) => {
                let Some(set) = &property.set else {
                    return Err(MonitorError::ReadOnlyMember(format!(
                        "{target}.{}",
                        property.name
                    )));
                };
                set(object, self.convert_value(token, &property.ty)?)?;
                Ok(ActionResult::unit())
            }
        }
    }

    fn access_indexer(
        &self,
        object: &ObjectRef,
        target: &str,
        indexers: &[&IndexerDescriptor],
        args: &[Token],
    ) -> Result<ActionResult> {
        let name = indexers.first().map(|i| i.name.as_str()).unwrap_or_default();
        if !matches!(args.first().map(Token::kind), Some(TokenKind::LeftBrace)) {
            return Err(MonitorError::recoverable(format!(
                "Indexer {name} is accessed as: {target} {name} [index] [value]"
            )));
        }
        let close = args
            .iter()
            .position(|t| matches!(t.kind(), TokenKind::RightBrace))
            .ok_or_else(|| MonitorError::recoverable(format!("Missing ] after index of {name}")))?;
        let index_tokens = &args[1..close];
        let new_value = args.get(close + 1);

        for indexer in indexers {
            if indexer.params.len() != index_tokens.len() {
                continue;
            }
            let Some(index) = indexer
                .params
                .iter()
                .zip(index_tokens)
                .map(|(param, token)| self.convert_token(token, &param.ty))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            return match new_value {
                None => {
                    let Some(get) = &indexer.get else {
                        return Err(MonitorError::recoverable(format!(
                            "Could not execute this action on indexer {name}"
                        )));
                    };
                    Ok(ActionResult {
                        value: get(object, &index)?,
                        ty: indexer.ty.clone(),
                    })
                }
                Some(token) => {
                    let Some(set) = &indexer.set else {
                        return Err(MonitorError::ReadOnlyMember(format!("{target}.{name}")));
                    };
                    set(object, &index, self.convert_value(token, &indexer.ty)?)?;
                    Ok(ActionResult::unit())
                }
            };
        }
        Err(MonitorError::ParametersMismatch {
            member: name.to_string(),
        })
    }
}

fn split_member<'a>(
    info: Option<&'a TypeInfo>,
    target: &str,
    args: &'a [Token],
) -> Result<(&'a str, &'a [Token])> {
    let no_member = |member: &str| MonitorError::NoSuchMember {
        target: target.to_string(),
        member: member.to_string(),
    };
    let Some(first) = args.first() else {
        return Err(MonitorError::recoverable(format!("No member of {target} given")));
    };
    match first.kind() {
        TokenKind::Literal(name) => Ok((name.as_str(), &args[1..])),
        TokenKind::LeftBrace => info
            .and_then(TypeInfo::default_indexer_name)
            .map(|name| (name, args))
            .ok_or_else(|| no_member("default-named indexer")),
        _ => Err(no_member(first.raw())),
    }
}

fn same_parameter_types(a: &MethodDescriptor, b: &MethodDescriptor) -> bool {
    a.params.len() == b.params.len() && a.params.iter().zip(&b.params).all(|(x, y)| x.ty == y.ty)
}
