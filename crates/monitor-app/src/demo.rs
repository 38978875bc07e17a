//! A small demo machine: a UART, a timer and a RAM block.
//!
//! Enough to try device actions, enum coercion, default indexers and
//! groups from the prompt without a real platform description.

use std::sync::Arc;

use parking_lot::Mutex;

use monitor_emulation::PERIPHERAL;
use monitor_terminal::Monitor;
use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{IntKind, MonitorObject, ParamSpec, TypeInfoBuilder, ValueType};
use monitor_types::value::{EnumSpec, Value};

/// Name of the machine created by [`install`].
pub const MACHINE: &str = "demo";

const RAM_SIZE: usize = 0x100;

// ---------------------------------------------------------------------------
// Uart
// ---------------------------------------------------------------------------

struct Uart {
    lines: Mutex<Vec<String>>,
    baud_rate: Mutex<i64>,
}

impl MonitorObject for Uart {
    fn label(&self) -> String {
        format!("uart @ {} baud", self.baud_rate.lock())
    }
}

fn register_uart(monitor: &mut Monitor) {
    monitor.types_mut().register::<Uart>(
        TypeInfoBuilder::<Uart>::new("Uart")
            .implements(PERIPHERAL)
            .method(
                "WriteLine",
                vec![ParamSpec::new("text", ValueType::String)],
                ValueType::Void,
                |uart, args| {
                    let text = args.first().map(ToString::to_string).unwrap_or_default();
                    log::info!("uart: {text}");
                    uart.lines.lock().push(text);
                    Ok(Value::Null)
                },
            )
            .method("Lines", vec![], ValueType::Array(Box::new(ValueType::String)), |uart, _| {
                Ok(Value::List(
                    uart.lines.lock().iter().cloned().map(Value::String).collect(),
                ))
            })
            .method("Clear", vec![], ValueType::Void, |uart, _| {
                uart.lines.lock().clear();
                Ok(Value::Null)
            })
            .property(
                "BaudRate",
                ValueType::Int(IntKind::U32),
                |uart| Ok(Value::Int(*uart.baud_rate.lock())),
                |uart, value| {
                    *uart.baud_rate.lock() = value.as_int().unwrap_or_default();
                    Ok(())
                },
            )
            .build(),
    );
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

struct Timer {
    mode: Mutex<i64>,
    limit: Mutex<i64>,
    enabled: Mutex<bool>,
}

impl MonitorObject for Timer {}

fn timer_mode() -> Arc<EnumSpec> {
    Arc::new(EnumSpec::new(
        "TimerMode",
        &[("OneShot", 0), ("Periodic", 1), ("Free", 2)],
    ))
}

fn register_timer(monitor: &mut Monitor) {
    let mode = timer_mode();
    let mode_spec = Arc::clone(&mode);
    monitor.types_mut().register::<Timer>(
        TypeInfoBuilder::<Timer>::new("Timer")
            .implements(PERIPHERAL)
            .property(
                "Mode",
                ValueType::Enum(Arc::clone(&mode)),
                move |timer| {
                    Ok(Value::Enum {
                        spec: Arc::clone(&mode_spec),
                        value: *timer.mode.lock(),
                    })
                },
                |timer, value| {
                    *timer.mode.lock() = value.as_int().unwrap_or_default();
                    Ok(())
                },
            )
            .property(
                "Limit",
                ValueType::Int(IntKind::U32),
                |timer| Ok(Value::Int(*timer.limit.lock())),
                |timer, value| {
                    *timer.limit.lock() = value.as_int().unwrap_or_default();
                    Ok(())
                },
            )
            .field_mut(
                "Enabled",
                ValueType::Bool,
                |timer| Ok(Value::Bool(*timer.enabled.lock())),
                |timer, value| {
                    *timer.enabled.lock() = matches!(value, Value::Bool(true));
                    Ok(())
                },
            )
            .method(
                "Configure",
                vec![
                    ParamSpec::new("mode", ValueType::Enum(mode)),
                    ParamSpec::new("limit", ValueType::Int(IntKind::U32))
                        .with_default(Value::Int(0xFFFF)),
                ],
                ValueType::Void,
                |timer, args| {
                    *timer.mode.lock() = args.first().and_then(Value::as_int).unwrap_or_default();
                    *timer.limit.lock() = args.get(1).and_then(Value::as_int).unwrap_or(0xFFFF);
                    Ok(Value::Null)
                },
            )
            .build(),
    );
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

struct Memory {
    bytes: Mutex<Vec<u8>>,
}

impl MonitorObject for Memory {}

fn offset(args: &[Value]) -> Result<usize> {
    let index = args.first().and_then(Value::as_int).unwrap_or(-1);
    usize::try_from(index)
        .ok()
        .filter(|i| *i < RAM_SIZE)
        .ok_or_else(|| MonitorError::recoverable(format!("Offset {index} is outside the memory")))
}

fn register_memory(monitor: &mut Monitor) {
    monitor.types_mut().register::<Memory>(
        TypeInfoBuilder::<Memory>::new("Memory")
            .implements(PERIPHERAL)
            .field("Size", ValueType::Int(IntKind::I32), |_| {
                Ok(Value::Int(RAM_SIZE as i64))
            })
            .indexer(
                "Item",
                vec![ParamSpec::new("offset", ValueType::Int(IntKind::I32))],
                ValueType::Int(IntKind::U8),
                |memory, args| Ok(Value::Int(i64::from(memory.bytes.lock()[offset(args)?]))),
                Some(|memory: &Memory, args: &[Value], value: Value| {
                    let byte = value.as_int().unwrap_or_default() as u8;
                    memory.bytes.lock()[offset(args)?] = byte;
                    Ok(())
                }),
            )
            .build(),
    );
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Register the demo types and create the `demo` machine as current.
pub fn install(monitor: &mut Monitor) -> Result<()> {
    register_uart(monitor);
    register_timer(monitor);
    register_memory(monitor);

    let machine = monitor.emulation().create_machine(Some(MACHINE))?;
    machine.register(
        "sysbus.uart0",
        Arc::new(Uart {
            lines: Mutex::new(Vec::new()),
            baud_rate: Mutex::new(115_200),
        }),
    )?;
    for name in ["sysbus.timer0", "sysbus.timer1"] {
        machine.register(
            name,
            Arc::new(Timer {
                mode: Mutex::new(0),
                limit: Mutex::new(0xFFFF),
                enabled: Mutex::new(false),
            }),
        )?;
    }
    machine.register(
        "sysbus.ram",
        Arc::new(Memory {
            bytes: Mutex::new(vec![0; RAM_SIZE]),
        }),
    )?;
    machine.add_group("timers", &["sysbus.timer0", "sysbus.timer1"])?;

    log::info!("demo machine ready");
    monitor.set_machine(Some(machine));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use monitor_terminal::BufferInteraction;
    use monitor_types::config::MonitorConfig;

    fn demo() -> Monitor {
        let mut monitor = Monitor::new(&MonitorConfig::default());
        install(&mut monitor).unwrap();
        monitor
    }

    fn run(monitor: &mut Monitor, line: &str) -> BufferInteraction {
        let mut out = BufferInteraction::new();
        assert!(monitor.parse(line, &mut out).unwrap(), "{line}: {}", out.errors());
        out
    }

    #[test]
    fn enum_property_accepts_member_names() {
        let mut m = demo();
        run(&mut m, "sysbus.timer0 Mode Periodic");
        let out = run(&mut m, "sysbus.timer0 Mode");
        assert!(out.output().starts_with("Periodic\n"));
        assert!(out.output().contains("Possible values are:"));

        let mut out = BufferInteraction::new();
        assert!(!m.parse("sysbus.timer0 Mode Sometimes", &mut out).unwrap());
        assert!(out.errors().contains("Enum value Sometimes is not defined for TimerMode!"));
    }

    #[test]
    fn default_indexer_reads_and_writes() {
        let mut m = demo();
        run(&mut m, "sysbus.ram [ 0x10 ] 0xAB");
        let out = run(&mut m, "sysbus.ram [ 0x10 ]");
        assert_eq!(out.output(), "0xAB\n");
    }

    #[test]
    fn optional_parameters_take_defaults() {
        let mut m = demo();
        run(&mut m, "sysbus.timer1 Configure Free");
        let out = run(&mut m, "sysbus.timer1 Limit");
        assert_eq!(out.output(), "0x0000FFFF\n");
    }

    #[test]
    fn read_only_field_rejects_writes() {
        let mut m = demo();
        let mut out = BufferInteraction::new();
        assert!(!m.parse("sysbus.ram Size 5", &mut out).unwrap());
        assert!(out.errors().contains("sysbus.ram.Size is read only"));
    }

    #[test]
    fn peripherals_are_listed_as_a_tree() {
        let mut m = demo();
        let out = run(&mut m, "peripherals");
        assert!(out.output().starts_with("Available peripherals of demo:\n  sysbus (SystemBus)\n"));
        assert!(out.output().contains("    timer0 (Timer)\n"));
    }
}
