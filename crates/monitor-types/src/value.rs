//! Decoded values flowing between tokens, member tables and result printing.

use std::fmt;
use std::sync::Arc;

use crate::member::ObjectRef;

// ---------------------------------------------------------------------------
// EnumSpec
// ---------------------------------------------------------------------------

/// A named enumeration exposed through a member table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSpec {
    pub name: String,
    pub variants: Vec<(String, i64)>,
    /// Whether undeclared bitwise combinations are valid values.
    pub flags: bool,
}

impl EnumSpec {
    pub fn new(name: &str, variants: &[(&str, i64)]) -> Self {
        Self {
            name: name.to_string(),
            variants: variants
                .iter()
                .map(|(n, v)| ((*n).to_string(), *v))
                .collect(),
            flags: false,
        }
    }

    /// Mark the enum as a bit set.
    pub fn flags(mut self) -> Self {
        self.flags = true;
        self
    }

    /// Look up a declared member by exact (case-sensitive) name.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn is_defined(&self, value: i64) -> bool {
        self.name_of(value).is_some()
    }

    /// Render a value as its member name, a `|`-joined flag set, or the
    /// bare number when nothing matches.
    pub fn describe(&self, value: i64) -> String {
        if let Some(name) = self.name_of(value) {
            return name.to_string();
        }
        if self.flags && value != 0 {
            let parts: Vec<&str> = self
                .variants
                .iter()
                .filter(|(_, v)| *v != 0 && value & *v == *v)
                .map(|(n, _)| n.as_str())
                .collect();
            let covered = self
                .variants
                .iter()
                .filter(|(_, v)| *v != 0 && value & *v == *v)
                .fold(0, |acc, (_, v)| acc | *v);
            if !parts.is_empty() && covered == value {
                return parts.join(" | ");
            }
        }
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A runtime value: a decoded token, an argument after coercion, or the
/// result of a device action.
#[derive(Clone)]
pub enum Value {
    /// No value: `null` arguments and results of unit-returning actions.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Inclusive address range.
    Range { start: u64, end: u64 },
    Enum { spec: Arc<EnumSpec>, value: i64 },
    List(Vec<Value>),
    /// Ordered key/value rows.
    Map(Vec<(String, Value)>),
    /// Rows of cells; the first row is the header.
    Table(Vec<Vec<String>>),
    Object(ObjectRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in conversion messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Int64",
            Self::Float(_) => "Double",
            Self::String(_) => "String",
            Self::Range { .. } => "Range",
            Self::Enum { .. } => "Enum",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Table(_) => "Table",
            Self::Object(_) => "Object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (
                Self::Range { start: a, end: b },
                Self::Range { start: c, end: d },
            ) => a == c && b == d,
            (Self::Enum { spec: a, value: x }, Self::Enum { spec: b, value: y }) => {
                a.name == b.name && x == y
            }
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Table(a), Self::Table(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Range { start, end } => write!(f, "Range({start:#x}..={end:#x})"),
            Self::Enum { spec, value } => write!(f, "Enum({}::{})", spec.name, spec.describe(*value)),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(rows) => f.debug_map().entries(rows.iter().map(|(k, v)| (k, v))).finish(),
            Self::Table(rows) => write!(f, "Table({rows:?})"),
            Self::Object(o) => write!(f, "Object({})", o.label()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Range { start, end } => write!(f, "<0x{start:X}, 0x{end:X}>"),
            Self::Enum { spec, value } => write!(f, "{}", spec.describe(*value)),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(rows) => {
                let parts: Vec<String> = rows.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Self::Table(rows) => write!(f, "<table with {} rows>", rows.len()),
            Self::Object(o) => write!(f, "{}", o.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_enum() -> EnumSpec {
        EnumSpec::new("Mode", &[("Foo", 0), ("Bar", 1)])
    }

    fn perms_enum() -> EnumSpec {
        EnumSpec::new("Access", &[("None", 0), ("Read", 1), ("Write", 2)]).flags()
    }

    #[test]
    fn enum_lookup_is_case_sensitive() {
        let e = mode_enum();
        assert_eq!(e.value_of("Foo"), Some(0));
        assert_eq!(e.value_of("foo"), None);
        assert!(e.is_defined(1));
        assert!(!e.is_defined(2));
    }

    #[test]
    fn enum_describe_plain() {
        assert_eq!(mode_enum().describe(1), "Bar");
        assert_eq!(mode_enum().describe(7), "7");
    }

    #[test]
    fn flags_describe_combination() {
        assert_eq!(perms_enum().describe(3), "Read | Write");
        assert_eq!(perms_enum().describe(0), "None");
        assert_eq!(perms_enum().describe(8), "8");
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::Range { start: 0x1000, end: 0x1fff }.to_string(),
            "<0x1000, 0x1FFF>"
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::String("a".into())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn enum_values_compare_by_spec_name() {
        let spec = Arc::new(mode_enum());
        let a = Value::Enum { spec: Arc::clone(&spec), value: 1 };
        let b = Value::Enum { spec, value: 1 };
        assert_eq!(a, b);
        assert_ne!(a, Value::Int(1));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::String("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Float(1.5).kind_name(), "Double");
    }
}
