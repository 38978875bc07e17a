//! Interface to an embedded scripting host.

use std::path::Path;

use monitor_types::error::Result;
use monitor_types::value::Value;

use crate::interaction::CommandInteraction;

/// A pluggable engine running foreign scripts and exposing extra builtins.
///
/// Hosts write script output to the sink themselves, translating newlines
/// as the sink expects.
pub trait ScriptHost {
    /// File extension (without the dot) of scripts this host runs.
    fn extension(&self) -> &str {
        "py"
    }

    /// Run a script buffer.
    fn execute_script(&mut self, source: &str, out: &mut dyn CommandInteraction) -> Result<()>;

    /// Run a script file.
    fn execute_file(&mut self, path: &Path, out: &mut dyn CommandInteraction) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.execute_script(&source, out)
    }

    /// Invoke builtin `name`. `None` means the host has no such builtin.
    fn execute_builtin(
        &mut self,
        name: &str,
        args: &[Value],
        out: &mut dyn CommandInteraction,
    ) -> Result<Option<bool>>;

    /// Names of the builtins, for suggestions.
    fn builtin_names(&self) -> Vec<String>;
}
