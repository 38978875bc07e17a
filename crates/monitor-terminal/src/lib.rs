//! The Monitor command interpreter.
//!
//! Lines of command text are tokenized, split into `;`-separated
//! invocations and dispatched to built-in commands, device actions on
//! peripherals and externals, or an embedded scripting host. The
//! interpreter is single-threaded; peripherals it acts on may be shared
//! with emulation threads.

pub mod coerce;
mod commands;
pub mod diagnostics;
pub mod format;
pub mod interaction;
mod interpreter;
pub mod invoker;
pub mod monitor_path;
pub mod resolver;
pub mod script_host;
pub mod session;
mod suggest;
pub mod tokenizer;
pub mod variables;

#[cfg(test)]
pub(crate) mod test_utils;

/// Register the built-in commands (help, set, mach, include, ...) into a registry.
pub use commands::register_builtins;
/// Output sink every command writes to.
pub use interaction::{BufferInteraction, CommandInteraction};
/// Invokes a member of a device with overload resolution and coercion.
pub use invoker::{ActionInvoker, ActionResult};
/// A single built-in command trait.
pub use interpreter::Command;
/// Registry of built-in commands, looked up by name or alias.
pub use interpreter::CommandRegistry;
/// The interpreter: session state plus dispatch.
pub use interpreter::Monitor;
/// Forms a built-in command accepts.
pub use interpreter::{Param, Signature, TokenPattern};
/// Joins script lines into logical lines around `"""` blocks.
pub use interpreter::{MAX_NESTING_DEPTH, logical_lines};
/// Include search path.
pub use monitor_path::MonitorPath;
/// Name bindings consulted before peripherals.
pub use resolver::{BindingContext, Bindings};
/// Embedded scripting host interface.
pub use script_host::ScriptHost;
/// Per-process interpreter state.
pub use session::{CaptureState, MonitorSession};
/// Splits command text into tokens.
pub use tokenizer::tokenize;
/// Scope-aware variable and macro storage.
pub use variables::{Scopes, StoreKind, VariableStore};
