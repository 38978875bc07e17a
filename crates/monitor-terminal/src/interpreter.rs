//! Command trait, registry, and the evaluator/dispatcher.
//!
//! A line is tokenized, split into `;`-separated invocations, each
//! invocation has its substitutions run, and what is left is dispatched to
//! a built-in command, a device action, or the scripting host.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use monitor_emulation::emulation::{Emulation, EmulationManager};
use monitor_emulation::fetch::is_uri;
use monitor_emulation::machine::Machine;
use monitor_emulation::types::register_types;
use monitor_types::config::MonitorConfig;
use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{ObjectRef, TypeRegistry};
use monitor_types::token::{Token, TokenKind, join_raw};
use monitor_types::value::Value;

use crate::coerce::decode;
use crate::commands::register_builtins;
use crate::diagnostics::{print_error, print_tokenization_error};
use crate::format;
use crate::interaction::{BufferInteraction, CommandInteraction};
use crate::invoker::ActionInvoker;
use crate::monitor_path::MonitorPath;
use crate::resolver::{Bindings, NameResolver, ResolvedTarget};
use crate::script_host::ScriptHost;
use crate::session::{CaptureState, MonitorSession, ORIGIN};
use crate::tokenizer::{MULTILINE_TERMINATOR, tokenize};
use crate::variables::{Scopes, StoreKind};

/// Bound on nested substitution, macro playback and script inclusion.
pub const MAX_NESTING_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// What kind of token a command parameter takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPattern {
    Any,
    Literal,
    /// A literal or a variable, taken as a name without expansion.
    Name,
    String,
    Path,
    Integer,
    Float,
    Boolean,
    Variable,
    Range,
    Terminator,
}

impl TokenPattern {
    pub fn matches(self, token: &Token) -> bool {
        match (self, token.kind()) {
            (Self::Any, _) => true,
            (Self::Literal, TokenKind::Literal(_)) => true,
            (Self::Name, TokenKind::Literal(_) | TokenKind::Variable(_)) => true,
            (Self::String, TokenKind::StringLiteral(_)) => true,
            (Self::Path, TokenKind::PathLiteral(_)) => true,
            (Self::Integer, TokenKind::Integer(_)) => true,
            (Self::Float, TokenKind::Float(_)) => true,
            (Self::Boolean, TokenKind::Boolean(_)) => true,
            (Self::Variable, TokenKind::Variable(_)) => true,
            (Self::Range, TokenKind::Range { .. }) => true,
            (Self::Terminator, TokenKind::MultilineTerminator) => true,
            _ => false,
        }
    }

    fn placeholder(self, name: &str) -> String {
        match self {
            Self::Path => format!("@{name}"),
            Self::Variable => format!("${name}"),
            Self::String => format!("\"{name}\""),
            Self::Terminator => MULTILINE_TERMINATOR.to_string(),
            _ => format!("<{name}>"),
        }
    }
}

/// One positional parameter of a command form.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub pattern: TokenPattern,
    /// Accepted spellings (case-insensitive); empty accepts anything.
    pub allowed: &'static [&'static str],
}

impl Param {
    fn accepts(&self, token: &Token) -> bool {
        if !self.pattern.matches(token) {
            return false;
        }
        if self.allowed.is_empty() {
            return true;
        }
        token
            .text()
            .is_some_and(|t| self.allowed.iter().any(|a| a.eq_ignore_ascii_case(t)))
    }
}

/// One invocable form of a command, identified by `form`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub form: &'static str,
    pub params: Vec<Param>,
    pub rest: Option<TokenPattern>,
}

impl Signature {
    pub fn new(form: &'static str) -> Self {
        Self {
            form,
            params: Vec::new(),
            rest: None,
        }
    }

    pub fn arg(mut self, name: &'static str, pattern: TokenPattern) -> Self {
        self.params.push(Param {
            name,
            pattern,
            allowed: &[],
        });
        self
    }

    /// A literal restricted to the given spellings.
    pub fn one_of(mut self, name: &'static str, allowed: &'static [&'static str]) -> Self {
        self.params.push(Param {
            name,
            pattern: TokenPattern::Literal,
            allowed,
        });
        self
    }

    /// Any remaining arguments, each matching `pattern`.
    pub fn rest(mut self, pattern: TokenPattern) -> Self {
        self.rest = Some(pattern);
        self
    }

    pub fn accepts(&self, args: &[Token]) -> bool {
        if args.len() < self.params.len() {
            return false;
        }
        if self.rest.is_none() && args.len() > self.params.len() {
            return false;
        }
        let fixed_ok = self.params.iter().zip(args).all(|(p, t)| p.accepts(t));
        let rest_ok = match self.rest {
            Some(pattern) => args[self.params.len()..].iter().all(|t| pattern.matches(t)),
            None => true,
        };
        fixed_ok && rest_ok
    }

    /// Whether every parameter names a specific token kind.
    pub fn is_accurate(&self) -> bool {
        self.params.iter().all(|p| p.pattern != TokenPattern::Any)
            && self.rest != Some(TokenPattern::Any)
    }

    pub fn usage(&self, command: &str) -> String {
        let mut parts = vec![command.to_string()];
        for param in &self.params {
            match param.allowed {
                [] => parts.push(param.pattern.placeholder(param.name)),
                [only] => parts.push((*only).to_string()),
                many => parts.push(many.join("|")),
            }
        }
        if let Some(pattern) = self.rest {
            parts.push(format!("[{} ...]", pattern.placeholder("arg")));
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A built-in command.
pub trait Command {
    /// The command name (what the user types).
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `help`.
    fn description(&self) -> &str;

    /// The accepted forms; `run` receives the `form` of the chosen one.
    fn signatures(&self) -> Vec<Signature>;

    /// Execute the chosen form. `Ok(false)` reports a failure that was
    /// already printed.
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool>;

    /// Completions for the argument being typed.
    fn suggestions(&self, _prefix: &str, _monitor: &Monitor) -> Vec<String> {
        Vec::new()
    }

    fn print_help(&self, out: &mut dyn CommandInteraction) {
        out.write_line(&format!("{} - {}", self.name(), self.description()));
        if !self.aliases().is_empty() {
            out.write_line(&format!("Aliases: {}", self.aliases().join(", ")));
        }
        out.write_line("");
        out.write_line("Usage:");
        for signature in self.signatures() {
            out.write_line(&format!(" {}", signature.usage(self.name())));
        }
    }
}

/// Pick the form of `command` accepting `args`.
fn choose_signature(command: &dyn Command, args: &[Token]) -> Result<Option<Signature>> {
    let accepting: Vec<Signature> = command
        .signatures()
        .into_iter()
        .filter(|s| s.accepts(args))
        .collect();
    let accurate: Vec<&Signature> = accepting.iter().filter(|s| s.is_accurate()).collect();
    let pool: Vec<&Signature> = if accurate.is_empty() {
        accepting.iter().collect()
    } else {
        accurate
    };
    match pool.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        [first, second, ..] => Err(MonitorError::AmbiguousOverload {
            owner: command.name().to_string(),
            first: first.usage(command.name()),
            second: second.usage(command.name()),
        }),
    }
}

/// Registry of built-in commands, looked up by name or alias.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Rc<dyn Command>>,
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Replaces any existing command with the same name.
    pub fn register(&mut self, command: Box<dyn Command>) {
        let command: Rc<dyn Command> = Rc::from(command);
        let name = command.name().to_string();
        for alias in command.aliases() {
            self.aliases.insert((*alias).to_string(), name.clone());
        }
        self.commands.insert(name, command);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Command>> {
        let name = self.aliases.get(name).map_or(name, String::as_str);
        self.commands.get(name).map(Rc::clone)
    }

    /// Commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Command>> {
        self.commands.values()
    }

    /// Names and aliases, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Script lines
// ---------------------------------------------------------------------------

/// Join the physical lines of a script into logical lines.
///
/// A line with an odd number of `"""` opens a block that runs up to the
/// next such line; the block becomes one logical line. A block whose
/// opening line starts with `"""` is appended to the preceding line.
pub fn logical_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut block: Option<String> = None;

    for line in text.lines() {
        let odd = line.matches(MULTILINE_TERMINATOR).count() % 2 == 1;
        if let Some(mut current) = block.take() {
            current.push('\n');
            current.push_str(line);
            if odd {
                lines.push(current);
            } else {
                block = Some(current);
            }
            continue;
        }
        if !odd {
            lines.push(line.to_string());
            continue;
        }
        let opened = if line.trim_start().starts_with(MULTILINE_TERMINATOR) {
            match lines.pop() {
                Some(previous) => format!("{previous}\n{line}"),
                None => line.to_string(),
            }
        } else {
            line.to_string()
        };
        block = Some(opened);
    }
    lines.extend(block);
    lines
}

fn split_groups(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token.kind() {
            TokenKind::Comment(_) => {}
            TokenKind::CommandSeparator => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(token),
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// The command interpreter: session state plus everything needed to
/// resolve and run invocations.
pub struct Monitor {
    pub(crate) commands: CommandRegistry,
    pub(crate) session: MonitorSession,
    pub(crate) manager: Arc<EmulationManager>,
    pub(crate) types: TypeRegistry,
    pub(crate) bindings: Bindings,
    pub(crate) script_host: Option<Box<dyn ScriptHost>>,
    pub(crate) monitor_path: MonitorPath,
    generation: u64,
    depth: usize,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_manager(config, Arc::new(EmulationManager::default()))
    }

    pub fn with_manager(config: &MonitorConfig, manager: Arc<EmulationManager>) -> Self {
        let mut types = TypeRegistry::new();
        register_types(&mut types);
        let mut commands = CommandRegistry::new();
        register_builtins(&mut commands);

        let mut search = vec![std::env::current_dir().unwrap_or_else(|_| ".".into())];
        search.extend(config.path.iter().cloned());

        Self {
            commands,
            session: MonitorSession::new(config),
            generation: manager.generation(),
            manager,
            types,
            bindings: Bindings::standard(),
            script_host: None,
            monitor_path: MonitorPath::new(search),
            depth: 0,
        }
    }

    // -- Embedding API --

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Member tables; peripheral models register theirs here.
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn register_command(&mut self, command: Box<dyn Command>) {
        self.commands.register(command);
    }

    pub fn set_script_host(&mut self, host: Box<dyn ScriptHost>) {
        self.script_host = Some(host);
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MonitorSession {
        &mut self.session
    }

    pub fn monitor_path(&self) -> &MonitorPath {
        &self.monitor_path
    }

    pub fn monitor_path_mut(&mut self) -> &mut MonitorPath {
        &mut self.monitor_path
    }

    pub fn emulation_manager(&self) -> &Arc<EmulationManager> {
        &self.manager
    }

    pub fn emulation(&self) -> Arc<Emulation> {
        self.manager.current()
    }

    pub fn current_machine(&self) -> Option<&Arc<Machine>> {
        self.session.current_machine()
    }

    pub fn set_machine(&mut self, machine: Option<Arc<Machine>>) {
        match &machine {
            Some(m) => log::info!("machine {} selected", m.name()),
            None => log::info!("no machine selected"),
        }
        self.session.current_machine = machine;
    }

    pub fn quit_requested(&self) -> bool {
        self.session.quit_requested()
    }

    /// Prompt for the next line of input.
    pub fn prompt(&self) -> String {
        if self.session.capture.is_active() {
            return "> ".to_string();
        }
        match self.current_machine() {
            Some(machine) => format!("({}) ", machine.name()),
            None => "(monitor) ".to_string(),
        }
    }

    /// Variable scopes in effect.
    pub fn scopes(&self) -> Scopes {
        Scopes {
            current: self.current_machine().map(|m| m.scope_name()),
            machines: self
                .emulation()
                .machines()
                .iter()
                .map(|m| m.scope_name())
                .collect(),
        }
    }

    /// Look up a variable the way `$name` would.
    pub fn variable(&self, name: &str) -> Option<&Token> {
        self.session
            .variables
            .lookup(name, &self.scopes())
            .map(|(_, token)| token)
    }

    /// Store into the variable or macro store; returns the qualified name.
    pub fn store_value(&mut self, store: StoreKind, name: &str, value: Token) -> String {
        let scopes = self.scopes();
        self.session.store_mut(store).set(name, value, &scopes)
    }

    /// Start a multi-line capture into `name`.
    pub(crate) fn begin_capture(&mut self, store: StoreKind, name: &str, opened: bool) {
        let name = self.scopes().qualify(name);
        log::debug!("capturing {name}");
        self.session.capture = if opened {
            CaptureState::Body {
                name,
                store,
                lines: Vec::new(),
            }
        } else {
            CaptureState::AwaitingOpen { name, store }
        };
    }

    /// Forget all session state tied to the current emulation.
    pub fn reset_session(&mut self) {
        self.session.reset();
    }

    pub(crate) fn resolver(&self) -> NameResolver<'_> {
        NameResolver {
            bindings: &self.bindings,
            manager: &self.manager,
            emulation: self.manager.current(),
            machine: self.session.current_machine.as_ref(),
            usings: &self.session.usings,
        }
    }

    // -- Evaluation --

    /// Evaluate one line of input. `Ok(false)` means a failure was reported
    /// and the caller should stop; `Err` is a failure the policy hands back.
    pub fn parse(&mut self, line: &str, out: &mut dyn CommandInteraction) -> Result<bool> {
        let line = if self.session.capture.is_active() {
            match self.feed_capture(line) {
                Some(rest) => rest,
                None => return Ok(true),
            }
        } else {
            line.to_string()
        };
        let Some(tokens) = self.tokenize_line(&line, out) else {
            return Ok(false);
        };
        self.parse_tokens(tokens, out)
    }

    /// Evaluate already tokenized input.
    pub fn parse_tokens(&mut self, tokens: Vec<Token>, out: &mut dyn CommandInteraction) -> Result<bool> {
        for group in split_groups(tokens) {
            if !self.evaluate_group(group, out)? && self.session.break_on_exception {
                return Ok(false);
            }
            if self.session.quit_requested() {
                break;
            }
        }
        Ok(true)
    }

    /// Run text line by line, stopping at the first line that reports
    /// failure.
    pub fn run_lines(&mut self, text: &str, out: &mut dyn CommandInteraction) -> Result<bool> {
        for line in logical_lines(text) {
            if !self.parse(&line, out)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run a monitor script with `ORIGIN` bound to its directory.
    pub fn execute_script(&mut self, path: &Path, out: &mut dyn CommandInteraction) -> Result<bool> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::recoverable(format!("Could not read {}: {e}", path.display()))
        })?;
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => ".".into(),
        };
        let directory = std::path::absolute(&directory).unwrap_or(directory);

        let previous = self.session.variables.get_qualified(ORIGIN).cloned();
        self.session
            .variables
            .set_qualified(ORIGIN, Token::path(&directory.to_string_lossy()));
        log::info!("executing script {}", path.display());

        let result = self.run_lines(&text, out);

        match previous {
            Some(origin) => self.session.variables.set_qualified(ORIGIN, origin),
            None => {
                self.session.variables.unset(ORIGIN);
            }
        }
        result
    }

    /// Locate `file` on the monitor path and run it, handing scripts of the
    /// scripting host's language to the host.
    pub fn include(&mut self, file: &str, out: &mut dyn CommandInteraction) -> Result<bool> {
        let path = self
            .monitor_path
            .resolve(file)
            .ok_or_else(|| MonitorError::recoverable(format!("Could not find file: {file}")))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        if let Some(host) = self.script_host.as_mut()
            && host.extension() == extension
        {
            host.execute_file(&path, out)?;
            return Ok(true);
        }
        if extension == "py" {
            return Err(MonitorError::recoverable(format!(
                "No scripting host is available to run {file}"
            )));
        }
        self.execute_script(&path, out)
    }

    /// Feed a line to the active capture. Returns the line when it must be
    /// processed normally instead.
    fn feed_capture(&mut self, line: &str) -> Option<String> {
        match std::mem::take(&mut self.session.capture) {
            CaptureState::Off => Some(line.to_string()),
            CaptureState::AwaitingOpen { name, store } => match line.find(MULTILINE_TERMINATOR) {
                Some(index) => {
                    self.session.capture = CaptureState::Body {
                        name,
                        store,
                        lines: Vec::new(),
                    };
                    let after = &line[index + MULTILINE_TERMINATOR.len()..];
                    if after.trim().is_empty() {
                        None
                    } else {
                        self.feed_capture(after)
                    }
                }
                None => {
                    log::debug!("capture of {name} abandoned");
                    self.session.store_mut(store).unset(&name);
                    Some(line.to_string())
                }
            },
            CaptureState::Body {
                name,
                store,
                mut lines,
            } => {
                match line.find(MULTILINE_TERMINATOR) {
                    Some(index) => {
                        let before = &line[..index];
                        if !before.trim().is_empty() {
                            lines.push(before.to_string());
                        }
                        log::debug!("captured {} line(s) into {name}", lines.len());
                        self.session
                            .store_mut(store)
                            .set_qualified(&name, Token::string(&lines.join("\n")));
                    }
                    None => {
                        lines.push(line.to_string());
                        self.session.capture = CaptureState::Body { name, store, lines };
                    }
                }
                None
            }
        }
    }

    /// Tokenize, retrying once with variables expanded when scanning
    /// stopped right after a variable.
    fn tokenize_line(&self, line: &str, out: &mut dyn CommandInteraction) -> Option<Vec<Token>> {
        let result = tokenize(line);
        if result.is_success() {
            return Some(result.tokens);
        }
        if result.tokens.last().is_some_and(Token::is_variable) {
            let expanded = self
                .session
                .variables
                .expand_known(&result.tokens, &self.scopes());
            let total = line.chars().count();
            let rest: String = line.chars().skip(total - result.unmatched).collect();
            let retry = tokenize(&format!("{}{rest}", join_raw(&expanded)));
            if retry.is_success() {
                return Some(retry.tokens);
            }
        }
        log::warn!("could not tokenize: {line}");
        print_tokenization_error(line, &result, out);
        None
    }

    fn evaluate_group(&mut self, group: Vec<Token>, out: &mut dyn CommandInteraction) -> Result<bool> {
        let text = join_raw(&group);
        if self.depth >= MAX_NESTING_DEPTH {
            let error = MonitorError::recoverable(format!(
                "Maximum nesting depth of {MAX_NESTING_DEPTH} exceeded"
            ));
            return self.handle_failure(&text, error, out);
        }

        let mut substituted = false;
        let mut expanded = Vec::with_capacity(group.len());
        for token in &group {
            match token.kind() {
                TokenKind::ExecutionSubstitution(inner) => {
                    let mut capture = BufferInteraction::new();
                    self.depth += 1;
                    let result = self.parse(inner, &mut capture);
                    self.depth -= 1;
                    let ok = result?;
                    if !ok || capture.has_errors() {
                        for line in capture.errors().lines() {
                            out.write_error(line);
                        }
                        return Ok(false);
                    }
                    let output = capture.output();
                    let output = output
                        .strip_suffix("\r\n")
                        .or_else(|| output.strip_suffix('\n'))
                        .unwrap_or(output);
                    expanded.push(Token::string(output));
                    substituted = true;
                }
                TokenKind::PathLiteral(path) if !Path::new(path).exists() && is_uri(path) => {
                    match self.manager.fetcher().fetch(path) {
                        Ok(local) => {
                            expanded.push(Token::path(&local.to_string_lossy()));
                            substituted = true;
                        }
                        Err(e) => {
                            log::warn!("failed to download {path}: {e}");
                            out.write_error(&format!(
                                "Failed to download {path}, see log for details."
                            ));
                            if self.session.break_on_exception {
                                return Ok(false);
                            }
                            expanded.push(token.clone());
                        }
                    }
                }
                _ => expanded.push(token.clone()),
            }
        }

        if substituted {
            let line = join_raw(&expanded);
            self.depth += 1;
            let result = match self.tokenize_line(&line, out) {
                Some(tokens) => self.parse_tokens(tokens, out),
                None => Ok(false),
            };
            self.depth -= 1;
            return result;
        }

        let outcome = match self.dispatch(&group, out) {
            Ok(ok) => Ok(ok),
            Err(error) => self.handle_failure(&text, error, out),
        };
        self.after_invocation(out)?;
        outcome
    }

    fn handle_failure(
        &mut self,
        command: &str,
        error: MonitorError,
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if error.is_recoverable() {
            log::debug!("'{command}' failed: {error}");
        } else if self.session.consume_exceptions {
            log::error!("'{command}' failed: {error}");
        } else {
            return Err(error);
        }
        print_error(command, &error, out);
        Ok(false)
    }

    // -- Dispatch --

    fn dispatch(&mut self, tokens: &[Token], out: &mut dyn CommandInteraction) -> Result<bool> {
        let Some(first) = tokens.first() else {
            return Ok(true);
        };
        if self.session.verbose {
            out.write_line(&format!("Executing: {}", join_raw(tokens)));
        }

        if let [name, op, value] = tokens
            && matches!(
                op.kind(),
                TokenKind::Equality | TokenKind::ConditionalEquality
            )
            && (name.is_literal() || name.is_variable())
        {
            return self.assign(name, op, value, out);
        }

        match first.kind() {
            TokenKind::Variable(_) => {
                let value = self.session.variables.expand(first, &self.scopes())?;
                let mut line = value.source_text();
                if tokens.len() > 1 {
                    line.push(' ');
                    line.push_str(&join_raw(&tokens[1..]));
                }
                log::debug!("{} expands to {line}", first.raw());
                self.depth += 1;
                let result = match self.tokenize_line(&line, out) {
                    Some(expanded) => self.parse_tokens(expanded, out),
                    None => Ok(false),
                };
                self.depth -= 1;
                result
            }
            TokenKind::Literal(name) => self.dispatch_name(name, tokens, out),
            _ => Err(MonitorError::NoSuchCommandOrDevice {
                name: first.raw().to_string(),
                longest_match: None,
            }),
        }
    }

    /// `name = value` and the conditional forms, run through `set`.
    fn assign(
        &mut self,
        name: &Token,
        op: &Token,
        value: &Token,
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let name = name.text().unwrap_or_default().to_string();
        let scopes = self.scopes();
        if matches!(op.kind(), TokenKind::ConditionalEquality)
            && self.session.variables.contains(&name, &scopes)
        {
            return Ok(true);
        }
        let value = self.session.variables.expand(value, &scopes)?;
        let set = self
            .commands
            .get(StoreKind::Variable.command_name())
            .ok_or_else(|| MonitorError::recoverable("The set command is not registered"))?;
        self.run_command(set, &[Token::literal(&name), value], out)
    }

    fn dispatch_name(
        &mut self,
        name: &str,
        tokens: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if let Some(command) = self.commands.get(name) {
            return self.run_command(command, &tokens[1..], out);
        }

        let resolved = self.resolver().resolve(name);
        let lookup_error = match resolved {
            Ok(target) => {
                let args = self.session.variables.expand_all(&tokens[1..], &self.scopes())?;
                self.device_action(&target, &args, out)?;
                return Ok(true);
            }
            Err(error) => error,
        };

        let manager = Arc::clone(&self.manager) as ObjectRef;
        if self
            .types
            .type_of(&*manager)
            .is_some_and(|info| info.has_member(name))
        {
            let target = ResolvedTarget {
                object: manager,
                name: "EmulationManager".to_string(),
            };
            let args = self.session.variables.expand_all(tokens, &self.scopes())?;
            self.device_action(&target, &args, out)?;
            return Ok(true);
        }

        if self.script_host.is_none() {
            return Err(lookup_error);
        }
        let scopes = self.scopes();
        let args: Vec<Value> = self
            .session
            .variables
            .expand_all(&tokens[1..], &scopes)?
            .iter()
            .map(decode)
            .collect();
        if let Some(host) = self.script_host.as_mut()
            && let Some(ok) = host.execute_builtin(name, &args, out)?
        {
            return Ok(ok);
        }
        Err(lookup_error)
    }

    fn run_command(
        &mut self,
        command: Rc<dyn Command>,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let mut args = args.to_vec();
        let mut chosen = choose_signature(&*command, &args)?;
        if chosen.is_none() && args.iter().any(Token::is_variable) {
            args = self.session.variables.expand_all(&args, &self.scopes())?;
            chosen = choose_signature(&*command, &args)?;
        }
        let Some(signature) = chosen else {
            command.print_help(out);
            return Err(MonitorError::ParametersMismatch {
                member: command.name().to_string(),
            });
        };
        log::debug!("running {} ({})", command.name(), signature.form);
        command.run(self, signature.form, &args, out)
    }

    /// Query or act on a resolved object.
    pub(crate) fn device_action(
        &self,
        target: &ResolvedTarget,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<()> {
        let info = self.types.type_of(&*target.object);
        let extensions = self.types.extensions_of(&*target.object);
        if args.is_empty() {
            format::print_members(&target.name, info.as_deref(), extensions, out);
            return Ok(());
        }

        let resolver = self.resolver();
        let invoker = ActionInvoker {
            types: &self.types,
            lookup: &resolver,
        };
        match invoker.invoke(&target.object, &target.name, args) {
            Ok(result) => {
                format::print_result(&result, self.session.number_mode, out);
                Ok(())
            }
            Err(MonitorError::ParametersMismatch { member }) => {
                format::print_member_help(&target.name, &member, info.as_deref(), extensions, out);
                Err(MonitorError::ParametersMismatch { member })
            }
            Err(error) => Err(error),
        }
    }

    /// Notice emulation replacement and play reset macros of machines that
    /// were reset.
    fn after_invocation(&mut self, out: &mut dyn CommandInteraction) -> Result<()> {
        let generation = self.manager.generation();
        if generation != self.generation {
            self.generation = generation;
            self.reset_session();
        }
        for machine in self.emulation().machines() {
            if machine.take_reset_request() {
                self.play_reset_macro(&machine, out)?;
            }
        }
        Ok(())
    }

    fn play_reset_macro(&mut self, machine: &Arc<Machine>, out: &mut dyn CommandInteraction) -> Result<()> {
        let name = format!("{}.reset", machine.scope_name());
        let Some(script) = self.session.macros.get_qualified(&name).map(Token::source_text) else {
            return Ok(());
        };
        log::info!("playing reset macro of {}", machine.name());
        let previous = self.session.current_machine.replace(Arc::clone(machine));
        self.depth += 1;
        let result = self.run_lines(&script, out);
        self.depth -= 1;
        self.session.current_machine = previous;
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl Command for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn aliases(&self) -> &[&str] {
            &["e"]
        }
        fn description(&self) -> &str {
            "Print arguments"
        }
        fn signatures(&self) -> Vec<Signature> {
            vec![
                Signature::new("one").arg("value", TokenPattern::Any),
                Signature::new("int").arg("value", TokenPattern::Integer),
                Signature::new("many").rest(TokenPattern::Any),
            ]
        }
        fn run(
            &self,
            _monitor: &mut Monitor,
            form: &str,
            _args: &[Token],
            out: &mut dyn CommandInteraction,
        ) -> Result<bool> {
            out.write_line(form);
            Ok(true)
        }
    }

    fn lex(line: &str) -> Vec<Token> {
        tokenize(line).tokens
    }

    #[test]
    fn accurate_forms_win() {
        let chosen = choose_signature(&Echo, &lex("5")).unwrap().unwrap();
        assert_eq!(chosen.form, "int");
        // Both inaccurate forms accept a single literal.
        assert!(matches!(
            choose_signature(&Echo, &lex("x")),
            Err(MonitorError::AmbiguousOverload { .. })
        ));
        let chosen = choose_signature(&Echo, &lex("a b")).unwrap().unwrap();
        assert_eq!(chosen.form, "many");
    }

    #[test]
    fn allow_lists_are_case_insensitive() {
        let sig = Signature::new("mode").one_of("mode", &["Decimal", "Both"]);
        assert!(sig.accepts(&lex("decimal")));
        assert!(!sig.accepts(&lex("octal")));
        assert!(!sig.accepts(&lex("")));
        assert_eq!(sig.usage("numbersMode"), "numbersMode Decimal|Both");
    }

    #[test]
    fn usage_lines() {
        let sig = Signature::new("x")
            .one_of("set", &["set"])
            .arg("file", TokenPattern::Path)
            .rest(TokenPattern::Any);
        assert_eq!(sig.usage("path"), "path set @file [<arg> ...]");
        assert!(!sig.is_accurate());
    }

    #[test]
    fn registry_resolves_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo));
        assert_eq!(registry.get("e").unwrap().name(), "echo");
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.names(), vec!["e", "echo"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn groups_split_on_separators() {
        let groups = split_groups(lex("a; ;b c # trailing"));
        assert_eq!(groups.len(), 2);
        assert_eq!(join_raw(&groups[1]), "b c");
    }

    #[test]
    fn script_blocks_become_logical_lines() {
        let script = "mach create\n\
                      macro reset\n\
                      \"\"\"\n\
                      sysbus Reset\n\
                      \"\"\"\n\
                      set x \"\"\"inline\"\"\"\n\
                      set y \"\"\"\n\
                      a\n\
                      \"\"\"\n\
                      start";
        let lines = logical_lines(script);
        assert_eq!(
            lines,
            vec![
                "mach create".to_string(),
                "macro reset\n\"\"\"\nsysbus Reset\n\"\"\"".to_string(),
                "set x \"\"\"inline\"\"\"".to_string(),
                "set y \"\"\"\na\n\"\"\"".to_string(),
                "start".to_string(),
            ]
        );
    }

    #[test]
    fn unterminated_block_is_kept() {
        assert_eq!(logical_lines("set x \"\"\"\nabc"), vec!["set x \"\"\"\nabc".to_string()]);
    }
}
