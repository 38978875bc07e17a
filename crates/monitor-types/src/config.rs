//! Monitor configuration loaded from TOML.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{MonitorError, Result};

/// How integer results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum NumberMode {
    #[default]
    Hexadecimal,
    Decimal,
    Both,
}

impl NumberMode {
    pub const ALL: [NumberMode; 3] = [Self::Hexadecimal, Self::Decimal, Self::Both];
}

impl fmt::Display for NumberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hexadecimal => "Hexadecimal",
            Self::Decimal => "Decimal",
            Self::Both => "Both",
        };
        f.write_str(name)
    }
}

impl FromStr for NumberMode {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| MonitorError::Config(format!("unknown number format: {s}")))
    }
}

/// Settings of the `[monitor]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// Print and log failures of commands instead of returning them to the host.
    #[serde(default = "default_true")]
    pub consume_exceptions_from_command: bool,
    /// Abort the rest of a line or script after a failed invocation.
    #[serde(default = "default_true")]
    pub break_script_on_exception: bool,
    #[serde(default)]
    pub number_format: NumberMode,
    /// Directories searched by `include` for relative script paths.
    #[serde(default)]
    pub path: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            consume_exceptions_from_command: true,
            break_script_on_exception: true,
            number_format: NumberMode::default(),
            path: Vec::new(),
        }
    }
}

/// Parse a config document; a missing `[monitor]` table yields defaults.
pub fn parse_config(toml_str: &str) -> Result<MonitorConfig> {
    #[derive(Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        monitor: MonitorConfig,
    }

    let file: ConfigFile = toml::from_str(toml_str)
        .map_err(|e| MonitorError::Config(format!("monitor config: {e}")))?;
    Ok(file.monitor)
}

/// Read and parse a config file.
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    log::info!("loaded monitor config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert!(config.consume_exceptions_from_command);
        assert!(config.break_script_on_exception);
        assert_eq!(config.number_format, NumberMode::Hexadecimal);
    }

    #[test]
    fn kebab_case_keys() {
        let config = parse_config(
            r#"
[monitor]
consume-exceptions-from-command = false
break-script-on-exception = false
number-format = "Both"
path = ["/opt/scripts", "scripts"]
"#,
        )
        .unwrap();
        assert!(!config.consume_exceptions_from_command);
        assert!(!config.break_script_on_exception);
        assert_eq!(config.number_format, NumberMode::Both);
        assert_eq!(config.path.len(), 2);
    }

    #[test]
    fn bad_number_format_is_config_error() {
        let err = parse_config("[monitor]\nnumber-format = \"Octal\"\n").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn number_mode_from_str_ignores_case() {
        assert_eq!("decimal".parse::<NumberMode>().unwrap(), NumberMode::Decimal);
        assert_eq!("HEXADECIMAL".parse::<NumberMode>().unwrap(), NumberMode::Hexadecimal);
        assert!("octal".parse::<NumberMode>().is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, MonitorError::Io(_)));
    }
}
