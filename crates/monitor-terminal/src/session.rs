//! Per-process interpreter state.

use std::sync::Arc;

use monitor_emulation::machine::Machine;
use monitor_types::config::{MonitorConfig, NumberMode};
use monitor_types::token::Token;

use crate::variables::{GLOBAL_SCOPE, StoreKind, VariableStore};

/// Variable bound to the directory of the running script.
pub const ORIGIN: &str = "global.ORIGIN";
/// Variable bound to the process working directory.
pub const CWD: &str = "global.CWD";

/// Progress of a multi-line `set`/`macro` capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CaptureState {
    #[default]
    Off,
    /// A name was given without a value; the next line must open the block.
    AwaitingOpen { name: String, store: StoreKind },
    /// Collecting body lines until the closing terminator.
    Body {
        name: String,
        store: StoreKind,
        lines: Vec<String>,
    },
}

impl CaptureState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Everything the interpreter remembers between lines.
pub struct MonitorSession {
    pub(crate) current_machine: Option<Arc<Machine>>,
    /// Alias prefixes tried when a name does not resolve directly; each ends
    /// with a dot.
    pub usings: Vec<String>,
    pub number_mode: NumberMode,
    pub verbose: bool,
    pub consume_exceptions: bool,
    pub break_on_exception: bool,
    pub(crate) capture: CaptureState,
    quit: bool,
    pub variables: VariableStore,
    pub macros: VariableStore,
}

impl MonitorSession {
    pub fn new(config: &MonitorConfig) -> Self {
        let mut session = Self {
            current_machine: None,
            usings: Vec::new(),
            number_mode: config.number_format,
            verbose: false,
            consume_exceptions: config.consume_exceptions_from_command,
            break_on_exception: config.break_script_on_exception,
            capture: CaptureState::Off,
            quit: false,
            variables: VariableStore::new(),
            macros: VariableStore::new(),
        };
        session.bind_cwd();
        session
    }

    pub fn current_machine(&self) -> Option<&Arc<Machine>> {
        self.current_machine.as_ref()
    }

    pub fn capture(&self) -> &CaptureState {
        &self.capture
    }

    pub fn store(&self, kind: StoreKind) -> &VariableStore {
        match kind {
            StoreKind::Variable => &self.variables,
            StoreKind::Macro => &self.macros,
        }
    }

    pub fn store_mut(&mut self, kind: StoreKind) -> &mut VariableStore {
        match kind {
            StoreKind::Variable => &mut self.variables,
            StoreKind::Macro => &mut self.macros,
        }
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Forget everything tied to the previous emulation. `ORIGIN` survives
    /// and `CWD` is bound again.
    pub fn reset(&mut self) {
        let origin = self.variables.get_qualified(ORIGIN).cloned();
        self.variables.clear();
        self.macros.clear();
        if let Some(origin) = origin {
            self.variables.set_qualified(ORIGIN, origin);
        }
        self.bind_cwd();
        self.current_machine = None;
        self.usings.clear();
        self.capture = CaptureState::Off;
        log::info!("monitor session reset");
    }

    fn bind_cwd(&mut self) {
        if let Ok(cwd) = std::env::current_dir() {
            self.variables
                .set_qualified(CWD, Token::path(&cwd.to_string_lossy()));
        }
    }
}

/// Qualified name of the global variable `name`.
pub fn global(name: &str) -> String {
    format!("{GLOBAL_SCOPE}.{name}")
}
