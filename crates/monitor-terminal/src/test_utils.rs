//! Shared fixtures for interpreter tests: a small machine with recording
//! peripherals and a scripting host that logs what it was asked to do.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use monitor_emulation::emulation::EmulationManager;
use monitor_emulation::fetch::FileFetcher;
use monitor_emulation::machine::Machine;
use monitor_emulation::types::PERIPHERAL;
use monitor_types::config::MonitorConfig;
use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{IntKind, MonitorObject, ParamSpec, TypeInfoBuilder, ValueType};
use monitor_types::value::Value;

use crate::interaction::{BufferInteraction, CommandInteraction};
use crate::interpreter::Monitor;
use crate::script_host::ScriptHost;

/// A serial port that records written lines.
#[derive(Default)]
pub struct FakeUart {
    pub lines: Mutex<Vec<String>>,
}

impl MonitorObject for FakeUart {}

/// A pin bank with a level and a press counter.
#[derive(Default)]
pub struct FakeGpio {
    pub level: Mutex<i64>,
    pub presses: Mutex<Vec<String>>,
}

impl MonitorObject for FakeGpio {}

/// An LED under the GPIO bank.
#[derive(Default)]
pub struct FakeLed {
    pub lit: Mutex<bool>,
}

impl MonitorObject for FakeLed {}

/// Build a monitor whose type registry knows the fake peripherals.
pub fn monitor() -> Monitor {
    with_fakes(Monitor::new(&MonitorConfig::default()))
}

/// Like [`monitor`], downloading remote paths through `fetcher`.
pub fn monitor_with_fetcher(fetcher: FakeFetcher) -> Monitor {
    let manager = Arc::new(EmulationManager::new(Arc::new(fetcher)));
    with_fakes(Monitor::with_manager(&MonitorConfig::default(), manager))
}

fn with_fakes(mut monitor: Monitor) -> Monitor {
    let types = monitor.types_mut();
    types.register::<FakeUart>(
        TypeInfoBuilder::<FakeUart>::new("FakeUart")
            .implements(PERIPHERAL)
            .method(
                "WriteLine",
                vec![ParamSpec::new("text", ValueType::String)],
                ValueType::Void,
                |uart, args| {
                    if let Some(Value::String(text)) = args.first() {
                        uart.lines.lock().push(text.clone());
                    }
                    Ok(Value::Null)
                },
            )
            .getter("LineCount", ValueType::Int(IntKind::I32), |uart| {
                Ok(Value::Int(uart.lines.lock().len() as i64))
            })
            .method("Explode", vec![], ValueType::Void, |_, _| {
                Err(MonitorError::Device("uart model crashed".into()))
            })
            .build(),
    );
    types.register::<FakeGpio>(
        TypeInfoBuilder::<FakeGpio>::new("FakeGpio")
            .implements(PERIPHERAL)
            .property(
                "Level",
                ValueType::Int(IntKind::I32),
                |gpio| Ok(Value::Int(*gpio.level.lock())),
                |gpio, value| {
                    *gpio.level.lock() = value.as_int().unwrap_or_default();
                    Ok(())
                },
            )
            .method("Press", vec![], ValueType::Void, |gpio, _| {
                gpio.presses.lock().push("short".into());
                Ok(Value::Null)
            })
            .method(
                "Press",
                vec![ParamSpec::new("milliseconds", ValueType::Int(IntKind::I32))],
                ValueType::Void,
                |gpio, args| {
                    let ms = args.first().and_then(Value::as_int).unwrap_or_default();
                    gpio.presses.lock().push(format!("{ms}ms"));
                    Ok(Value::Null)
                },
            )
            .build(),
    );
    types.register::<FakeLed>(
        TypeInfoBuilder::<FakeLed>::new("FakeLed")
            .implements(PERIPHERAL)
            .getter("Lit", ValueType::Bool, |led| Ok(Value::Bool(*led.lit.lock())))
            .method("Toggle", vec![], ValueType::Void, |led, _| {
                let mut lit = led.lit.lock();
                *lit = !*lit;
                Ok(Value::Null)
            })
            .build(),
    );
    monitor
}

/// Peripherals of the machine built by [`board`].
pub struct Board {
    pub machine: Arc<Machine>,
    pub uart: Arc<FakeUart>,
    pub gpio: Arc<FakeGpio>,
    pub led: Arc<FakeLed>,
}

/// Add a machine named `name` with `sysbus.uart`, `sysbus.gpio` and
/// `sysbus.gpio.led`, and select it.
pub fn board(monitor: &mut Monitor, name: &str) -> Board {
    let machine = monitor
        .emulation()
        .create_machine(Some(name))
        .expect("machine");
    let uart = Arc::new(FakeUart::default());
    let gpio = Arc::new(FakeGpio::default());
    let led = Arc::new(FakeLed::default());
    machine.register("sysbus.uart", Arc::clone(&uart) as _).expect("uart");
    machine.register("sysbus.gpio", Arc::clone(&gpio) as _).expect("gpio");
    machine
        .register("sysbus.gpio.led", Arc::clone(&led) as _)
        .expect("led");
    monitor.set_machine(Some(Arc::clone(&machine)));
    Board {
        machine,
        uart,
        gpio,
        led,
    }
}

/// Run one line, returning the sink and the outcome.
pub fn run(monitor: &mut Monitor, line: &str) -> (BufferInteraction, Result<bool>) {
    let mut out = BufferInteraction::new();
    let result = monitor.parse(line, &mut out);
    (out, result)
}

/// Run lines that must all succeed without error output.
pub fn run_ok(monitor: &mut Monitor, lines: &[&str]) -> BufferInteraction {
    let mut out = BufferInteraction::new();
    for line in lines {
        let ok = monitor.parse(line, &mut out).expect("parse");
        assert!(ok, "line {line:?} failed: {}", out.errors());
    }
    assert!(!out.has_errors(), "unexpected errors: {}", out.errors());
    out
}

/// Serves fixed URIs from local files; anything else fails to download.
#[derive(Default)]
pub struct FakeFetcher {
    pub files: HashMap<String, PathBuf>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FileFetcher for FakeFetcher {
    fn fetch(&self, uri: &str) -> Result<PathBuf> {
        self.requests.lock().push(uri.to_string());
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| MonitorError::Fetch(format!("404 for {uri}")))
    }
}

/// A scripting host recording scripts and builtin calls.
#[derive(Default)]
pub struct RecordingHost {
    pub log: Arc<Mutex<Vec<String>>>,
}

impl ScriptHost for RecordingHost {
    fn execute_script(&mut self, source: &str, out: &mut dyn CommandInteraction) -> Result<()> {
        self.log.lock().push(format!("script: {source}"));
        out.write_line("ran");
        Ok(())
    }

    fn execute_builtin(
        &mut self,
        name: &str,
        args: &[Value],
        out: &mut dyn CommandInteraction,
    ) -> Result<Option<bool>> {
        if name != "greet" {
            return Ok(None);
        }
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        self.log.lock().push(format!("greet {}", args.join(" ")));
        out.write_line("hello");
        Ok(Some(true))
    }

    fn builtin_names(&self) -> Vec<String> {
        vec!["greet".to_string()]
    }
}
