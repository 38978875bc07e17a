//! Built-in monitor commands.

use monitor_types::config::NumberMode;
use monitor_types::error::{MonitorError, Result};
use monitor_types::token::{Token, TokenKind, join_raw};

use crate::format;
use crate::interaction::CommandInteraction;
use crate::interpreter::{Command, CommandRegistry, Monitor, Signature, TokenPattern};
use crate::monitor_path::PATH_SEPARATOR;
use crate::variables::StoreKind;

/// Register all built-in commands into a registry.
pub fn register_builtins(reg: &mut CommandRegistry) {
    reg.register(Box::new(HelpCmd));
    reg.register(Box::new(IncludeCmd));
    reg.register(Box::new(StoreCmd(StoreKind::Variable)));
    reg.register(Box::new(StoreCmd(StoreKind::Macro)));
    reg.register(Box::new(ExecuteCmd));
    reg.register(Box::new(RunMacroCmd));
    reg.register(Box::new(MachCmd));
    reg.register(Box::new(UsingCmd));
    reg.register(Box::new(PathCmd));
    reg.register(Box::new(VerboseCmd));
    reg.register(Box::new(NumbersModeCmd));
    reg.register(Box::new(PeripheralsCmd));
    reg.register(Box::new(StartCmd));
    reg.register(Box::new(PauseCmd));
    reg.register(Box::new(PythonCmd));
    reg.register(Box::new(QuitCmd));
}

/// Text of a word-like argument.
fn word(token: &Token) -> &str {
    token.text().unwrap_or_else(|| token.raw())
}

fn filter_prefix<I>(candidates: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    candidates
        .into_iter()
        .filter(|c| c.starts_with(prefix))
        .collect()
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

struct HelpCmd;
impl Command for HelpCmd {
    fn name(&self) -> &str {
        "help"
    }
    fn aliases(&self) -> &[&str] {
        &["?", "h"]
    }
    fn description(&self) -> &str {
        "List commands or show help for one command or device"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("list"),
            Signature::new("topic").arg("command", TokenPattern::Literal),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if form == "list" {
            out.write_line("Available commands:");
            let mut rows = vec![vec!["Name".to_string(), "Description".to_string()]];
            for command in monitor.commands().iter() {
                rows.push(vec![command.name().to_string(), command.description().to_string()]);
            }
            format::print_table(&rows, out);
            out.write_line("");
            out.write_line("Type a device name without arguments to list its members.");
            return Ok(true);
        }

        let topic = word(&args[0]);
        if let Some(command) = monitor.commands().get(topic) {
            command.print_help(out);
            return Ok(true);
        }
        let target = monitor.resolver().resolve(topic)?;
        monitor.device_action(&target, &[], out)?;
        Ok(true)
    }
    fn suggestions(&self, prefix: &str, monitor: &Monitor) -> Vec<String> {
        filter_prefix(monitor.commands().names(), prefix)
    }
}

// ---------------------------------------------------------------------------
// include
// ---------------------------------------------------------------------------

struct IncludeCmd;
impl Command for IncludeCmd {
    fn name(&self) -> &str {
        "include"
    }
    fn aliases(&self) -> &[&str] {
        &["i"]
    }
    fn description(&self) -> &str {
        "Run a monitor script, or a scripting host script"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("file").arg("file", TokenPattern::Path),
            Signature::new("file").arg("file", TokenPattern::String),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        monitor.include(word(&args[0]), out)
    }
}

// ---------------------------------------------------------------------------
// set / macro
// ---------------------------------------------------------------------------

/// `set` and `macro` share their forms; only the store differs.
struct StoreCmd(StoreKind);
impl Command for StoreCmd {
    fn name(&self) -> &str {
        self.0.command_name()
    }
    fn description(&self) -> &str {
        match self.0 {
            StoreKind::Variable => "Set a variable, or capture a multi-line value",
            StoreKind::Macro => "Define a macro, or capture a multi-line macro body",
        }
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("await").arg("name", TokenPattern::Name),
            Signature::new("open")
                .arg("name", TokenPattern::Name)
                .arg("terminator", TokenPattern::Terminator),
            Signature::new("assign")
                .arg("name", TokenPattern::Name)
                .arg("value", TokenPattern::Any),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        _out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let name = word(&args[0]);
        match form {
            "await" => monitor.begin_capture(self.0, name, false),
            "open" => monitor.begin_capture(self.0, name, true),
            _ => {
                let value = monitor
                    .session
                    .variables
                    .expand(&args[1], &monitor.scopes())?;
                let qualified = monitor.store_value(self.0, name, value);
                log::debug!("{} {qualified}", self.0.command_name());
            }
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

struct ExecuteCmd;
impl Command for ExecuteCmd {
    fn name(&self) -> &str {
        "execute"
    }
    fn description(&self) -> &str {
        "Run the commands held by a variable, or the given tokens"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("variable").arg("variable", TokenPattern::Variable),
            Signature::new("tokens").rest(TokenPattern::Any),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let text = if form == "variable" {
            monitor
                .session
                .variables
                .expand(&args[0], &monitor.scopes())?
                .source_text()
        } else {
            join_raw(args)
        };
        monitor.run_lines(&text, out)
    }
    fn suggestions(&self, prefix: &str, monitor: &Monitor) -> Vec<String> {
        let scopes = monitor.scopes();
        let names = monitor
            .session()
            .variables
            .names()
            .map(|n| format!("${}", scopes.unqualified(n)))
            .collect::<Vec<_>>();
        filter_prefix(names, prefix)
    }
}

// ---------------------------------------------------------------------------
// runMacro
// ---------------------------------------------------------------------------

struct RunMacroCmd;
impl Command for RunMacroCmd {
    fn name(&self) -> &str {
        "runMacro"
    }
    fn description(&self) -> &str {
        "Play back a macro"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new("name").arg("macro", TokenPattern::Name)]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let name = word(&args[0]);
        let script = monitor
            .session
            .macros
            .lookup(name, &monitor.scopes())
            .map(|(_, body)| body.source_text())
            .ok_or_else(|| MonitorError::recoverable(format!("No such macro: {name}")))?;
        monitor.run_lines(&script, out)
    }
    fn suggestions(&self, prefix: &str, monitor: &Monitor) -> Vec<String> {
        let scopes = monitor.scopes();
        let names = monitor
            .session()
            .macros
            .names()
            .map(|n| format!("${}", scopes.unqualified(n)))
            .collect::<Vec<_>>();
        filter_prefix(names, prefix)
    }
}

// ---------------------------------------------------------------------------
// mach
// ---------------------------------------------------------------------------

struct MachCmd;
impl Command for MachCmd {
    fn name(&self) -> &str {
        "mach"
    }
    fn description(&self) -> &str {
        "List, select, create and remove machines"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("list"),
            Signature::new("set")
                .one_of("set", &["set"])
                .arg("name", TokenPattern::String),
            Signature::new("set")
                .one_of("set", &["set"])
                .arg("name", TokenPattern::Literal),
            Signature::new("set-index")
                .one_of("set", &["set"])
                .arg("index", TokenPattern::Integer),
            Signature::new("add")
                .one_of("add", &["add"])
                .arg("name", TokenPattern::String),
            Signature::new("rem")
                .one_of("rem", &["rem"])
                .arg("name", TokenPattern::String),
            Signature::new("create").one_of("create", &["create"]),
            Signature::new("create")
                .one_of("create", &["create"])
                .arg("name", TokenPattern::String),
            Signature::new("clear").one_of("clear", &["clear"]),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let emulation = monitor.emulation();
        match form {
            "list" => {
                let names = emulation.machine_names();
                if names.is_empty() {
                    out.write_line("No machines available.");
                    return Ok(true);
                }
                let current = monitor.current_machine().map(|m| m.name().to_string());
                out.write_line("Available machines:");
                for (index, name) in names.iter().enumerate() {
                    let marker = if current.as_deref() == Some(name) { " [current]" } else { "" };
                    out.write_line(&format!("\t{index}: {name}{marker}"));
                }
            }
            "set" => {
                let name = word(&args[1]);
                let machine = emulation
                    .machine(name)
                    .ok_or_else(|| MonitorError::recoverable(format!("No machine named {name}")))?;
                monitor.set_machine(Some(machine));
            }
            "set-index" => {
                let index = args[1].value().as_int().unwrap_or(-1);
                let machine = usize::try_from(index)
                    .ok()
                    .and_then(|i| emulation.machine_at(i))
                    .ok_or_else(|| {
                        MonitorError::recoverable(format!("No machine with index {index}"))
                    })?;
                monitor.set_machine(Some(machine));
            }
            "add" => {
                emulation.create_machine(Some(word(&args[1])))?;
            }
            "rem" => {
                let removed = emulation.remove_machine(word(&args[1]))?;
                if monitor
                    .current_machine()
                    .is_some_and(|m| m.name() == removed.name())
                {
                    monitor.set_machine(None);
                }
            }
            "create" => {
                let machine = emulation.create_machine(args.get(1).map(word))?;
                monitor.set_machine(Some(machine));
            }
            _ => monitor.set_machine(None),
        }
        Ok(true)
    }
    fn suggestions(&self, prefix: &str, monitor: &Monitor) -> Vec<String> {
        let words = ["set", "add", "rem", "create", "clear"].map(String::from);
        let mut result = filter_prefix(words, prefix);
        result.extend(filter_prefix(monitor.emulation().machine_names(), prefix));
        result
    }
}

// ---------------------------------------------------------------------------
// using
// ---------------------------------------------------------------------------

struct UsingCmd;
impl Command for UsingCmd {
    fn name(&self) -> &str {
        "using"
    }
    fn description(&self) -> &str {
        "Add a prefix tried when resolving device names; '-' clears them"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("list"),
            Signature::new("add").arg("prefix", TokenPattern::Literal),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if form == "list" {
            if monitor.session.usings.is_empty() {
                out.write_line("No prefixes in use.");
            }
            for prefix in &monitor.session.usings {
                out.write_line(prefix);
            }
            return Ok(true);
        }

        let prefix = word(&args[0]);
        if prefix == "-" {
            monitor.session.usings.clear();
            return Ok(true);
        }
        let prefix = format!("{}.", prefix.trim_end_matches('.'));
        if !monitor.session.usings.contains(&prefix) {
            log::debug!("using {prefix}");
            monitor.session.usings.push(prefix);
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// path
// ---------------------------------------------------------------------------

struct PathCmd;
impl Command for PathCmd {
    fn name(&self) -> &str {
        "path"
    }
    fn description(&self) -> &str {
        "Show or change the include search path"
    }
    fn signatures(&self) -> Vec<Signature> {
        let mut forms = vec![
            Signature::new("show"),
            Signature::new("reset").one_of("reset", &["reset"]),
        ];
        for (form, keyword) in [("set", &["set"]), ("add", &["add"])] {
            for pattern in [TokenPattern::Path, TokenPattern::String] {
                forms.push(
                    Signature::new(form)
                        .one_of(form, keyword)
                        .arg("directories", pattern),
                );
            }
        }
        forms
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let path = &mut monitor.monitor_path;
        match form {
            "set" => path.set(word(&args[1])),
            "add" => path.add(word(&args[1])),
            "reset" => path.reset(),
            _ => {}
        }
        let entries: Vec<String> = path
            .entries()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        out.write_line(&entries.join(&PATH_SEPARATOR.to_string()));
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// verbose
// ---------------------------------------------------------------------------

struct VerboseCmd;
impl Command for VerboseCmd {
    fn name(&self) -> &str {
        "verbose"
    }
    fn description(&self) -> &str {
        "Echo each invocation before running it"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("show"),
            Signature::new("set").arg("enabled", TokenPattern::Boolean),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if form == "set" {
            monitor.session.verbose = matches!(args[0].kind(), TokenKind::Boolean(true));
        }
        out.write_line(&format!("Verbose mode: {}", monitor.session.verbose));
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// numbersMode
// ---------------------------------------------------------------------------

struct NumbersModeCmd;
impl Command for NumbersModeCmd {
    fn name(&self) -> &str {
        "numbersMode"
    }
    fn description(&self) -> &str {
        "Show or change how integer results are printed"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("show"),
            Signature::new("set").one_of("mode", &["Hexadecimal", "Decimal", "Both"]),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if form == "set" {
            monitor.session.number_mode = word(&args[0]).parse()?;
        }
        out.write_line(&format!("Numbers mode: {}", monitor.session.number_mode));
        Ok(true)
    }
    fn suggestions(&self, prefix: &str, _monitor: &Monitor) -> Vec<String> {
        filter_prefix(NumberMode::ALL.map(|m| m.to_string()), prefix)
    }
}

// ---------------------------------------------------------------------------
// peripherals
// ---------------------------------------------------------------------------

struct PeripheralsCmd;
impl Command for PeripheralsCmd {
    fn name(&self) -> &str {
        "peripherals"
    }
    fn description(&self) -> &str {
        "List the peripherals of the current machine"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new("tree")]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        _args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let Some(machine) = monitor.current_machine() else {
            return Err(MonitorError::recoverable("Select active machine."));
        };
        out.write_line(&format!("Available peripherals of {}:", machine.name()));
        for name in machine.peripheral_names() {
            let Some(object) = machine.peripheral(&name) else {
                continue;
            };
            let depth = name.matches('.').count();
            let leaf = name.rsplit('.').next().unwrap_or(&name);
            out.write_line(&format!(
                "{}{leaf} ({})",
                "  ".repeat(depth + 1),
                monitor.types().type_name(&*object)
            ));
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// start / pause
// ---------------------------------------------------------------------------

struct StartCmd;
impl Command for StartCmd {
    fn name(&self) -> &str {
        "start"
    }
    fn description(&self) -> &str {
        "Start all machines, optionally including a script first"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("all"),
            Signature::new("script").arg("file", TokenPattern::Path),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        if form == "script" && !monitor.include(word(&args[0]), out)? {
            return Ok(false);
        }
        monitor.emulation().start_all();
        out.write_line("Starting emulation...");
        Ok(true)
    }
}

struct PauseCmd;
impl Command for PauseCmd {
    fn name(&self) -> &str {
        "pause"
    }
    fn description(&self) -> &str {
        "Pause all machines"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new("all")]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        _args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        monitor.emulation().pause_all();
        out.write_line("Pausing emulation...");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// python
// ---------------------------------------------------------------------------

struct PythonCmd;
impl Command for PythonCmd {
    fn name(&self) -> &str {
        "python"
    }
    fn aliases(&self) -> &[&str] {
        &["py"]
    }
    fn description(&self) -> &str {
        "Run code in the scripting host"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new("code").arg("code", TokenPattern::String),
            Signature::new("variable").arg("code", TokenPattern::Variable),
        ]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        args: &[Token],
        out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        let source = monitor
            .session
            .variables
            .expand(&args[0], &monitor.scopes())?
            .source_text();
        let host = monitor
            .script_host
            .as_mut()
            .ok_or_else(|| MonitorError::recoverable("No scripting host is available"))?;
        host.execute_script(&source, out)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// quit
// ---------------------------------------------------------------------------

struct QuitCmd;
impl Command for QuitCmd {
    fn name(&self) -> &str {
        "quit"
    }
    fn aliases(&self) -> &[&str] {
        &["q"]
    }
    fn description(&self) -> &str {
        "Leave the monitor"
    }
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new("quit")]
    }
    fn run(
        &self,
        monitor: &mut Monitor,
        _form: &str,
        _args: &[Token],
        _out: &mut dyn CommandInteraction,
    ) -> Result<bool> {
        monitor.set_machine(None);
        monitor.session.request_quit();
        log::info!("quit requested");
        Ok(true)
    }
}
