//! Error types for the Monitor.

use std::io;

/// Errors produced by the Monitor command engine.
///
/// Everything except [`MonitorError::Device`], [`MonitorError::Io`],
/// [`MonitorError::TomlParse`], [`MonitorError::Config`] and
/// [`MonitorError::Fetch`] is recoverable: it aborts the current invocation
/// but never the hosting process.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Input could not be tokenized past `offset`.
    #[error("could not tokenize input at offset {offset}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Lex {
        offset: usize,
        message: Option<String>,
    },

    #[error("No such variable: ${0}")]
    NoSuchVariable(String),

    #[error("No such command or device: {name}{}", .longest_match.as_deref().map(|m| format!(", the longest match is {m}")).unwrap_or_default())]
    NoSuchCommandOrDevice {
        name: String,
        longest_match: Option<String>,
    },

    #[error("{target} does not provide a field, method or property {member}.")]
    NoSuchMember { target: String, member: String },

    #[error("Parameters did not match the signature of {member}")]
    ParametersMismatch { member: String },

    #[error("{0}")]
    Conversion(String),

    #[error("Ambiguous choice between {first} and {second} of {owner}")]
    AmbiguousOverload {
        owner: String,
        first: String,
        second: String,
    },

    #[error("{0} is read only")]
    ReadOnlyMember(String),

    /// A controlled failure raised by a command or a device action.
    #[error("{0}")]
    Recoverable(String),

    /// Several independent failures, e.g. from an action fanned out over a group.
    #[error("{} errors occurred", .0.len())]
    Aggregate(Vec<MonitorError>),

    /// A failure carrying an outer context message. A `None` message marks a
    /// wrapper that adds nothing, which the diagnostic formatter suppresses.
    #[error("{}", .message.as_deref().unwrap_or("wrapped error"))]
    Wrapped {
        message: Option<String>,
        inner: Box<MonitorError>,
    },

    /// A defect inside a device model.
    #[error("device error: {0}")]
    Device(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl MonitorError {
    /// Convenience constructor for [`MonitorError::Recoverable`].
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self::Recoverable(message.into())
    }

    /// Wrap `inner` with a context message.
    pub fn wrap(message: impl Into<String>, inner: MonitorError) -> Self {
        Self::Wrapped {
            message: Some(message.into()),
            inner: Box::new(inner),
        }
    }

    /// Whether the failure aborts only the current invocation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Device(_)
            | Self::Config(_)
            | Self::Fetch(_)
            | Self::Io(_)
            | Self::TomlParse(_) => false,
            Self::Aggregate(inner) => inner.iter().all(MonitorError::is_recoverable),
            Self::Wrapped { inner, .. } => inner.is_recoverable(),
            _ => true,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_variable_display() {
        let e = MonitorError::NoSuchVariable("foo".into());
        assert_eq!(format!("{e}"), "No such variable: $foo");
    }

    #[test]
    fn no_such_command_without_match() {
        let e = MonitorError::NoSuchCommandOrDevice {
            name: "uart9".into(),
            longest_match: None,
        };
        assert_eq!(format!("{e}"), "No such command or device: uart9");
    }

    #[test]
    fn no_such_command_with_longest_match() {
        let e = MonitorError::NoSuchCommandOrDevice {
            name: "sysbus.uart9".into(),
            longest_match: Some("sysbus".into()),
        };
        assert_eq!(
            format!("{e}"),
            "No such command or device: sysbus.uart9, the longest match is sysbus"
        );
    }

    #[test]
    fn lex_error_display() {
        let e = MonitorError::Lex {
            offset: 3,
            message: Some("bad range".into()),
        };
        assert_eq!(format!("{e}"), "could not tokenize input at offset 3: bad range");
    }

    #[test]
    fn device_error_is_not_recoverable() {
        assert!(!MonitorError::Device("bus fault".into()).is_recoverable());
        assert!(MonitorError::recoverable("nope").is_recoverable());
    }

    #[test]
    fn aggregate_recoverability_follows_parts() {
        let ok = MonitorError::Aggregate(vec![
            MonitorError::recoverable("a"),
            MonitorError::ReadOnlyMember("b".into()),
        ]);
        assert!(ok.is_recoverable());
        let bad = MonitorError::Aggregate(vec![
            MonitorError::recoverable("a"),
            MonitorError::Device("b".into()),
        ]);
        assert!(!bad.is_recoverable());
    }

    #[test]
    fn wrapped_recoverability_follows_inner() {
        let e = MonitorError::wrap("outer", MonitorError::Device("inner".into()));
        assert!(!e.is_recoverable());
        assert_eq!(format!("{e}"), "outer");
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: MonitorError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
        assert!(!e.is_recoverable());
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: MonitorError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }
}
