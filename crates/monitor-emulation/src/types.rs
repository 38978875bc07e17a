//! Member tables of the emulation objects themselves.

use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{IntKind, ParamSpec, TypeInfoBuilder, TypeRegistry, ValueType};
use monitor_types::value::Value;

use crate::emulation::{Emulation, EmulationManager};
use crate::machine::{Machine, PeripheralsGroup, SystemBus};

/// Interface name satisfied by every peripheral.
pub const PERIPHERAL: &str = "IPeripheral";
/// Interface name satisfied by externals.
pub const EXTERNAL: &str = "IExternal";
/// Interface name satisfied by peripheral groups.
pub const PERIPHERALS_GROUP: &str = "IPeripheralsGroup";

fn address_arg(args: &[Value], index: usize) -> Result<u64> {
    args.get(index)
        .and_then(Value::as_int)
        .map(|v| v as u64)
        .ok_or_else(|| MonitorError::recoverable("missing address argument"))
}

fn u64_param(name: &str) -> ParamSpec {
    ParamSpec::new(name, ValueType::Int(IntKind::U64))
}

/// Register the member tables of machines, emulations, the manager, the
/// system bus and peripheral groups.
pub fn register_types(registry: &mut TypeRegistry) {
    registry.register::<EmulationManager>(
        TypeInfoBuilder::<EmulationManager>::new("EmulationManager")
            .method("Clear", vec![], ValueType::Void, |m, _| {
                m.clear();
                Ok(Value::Null)
            })
            .getter("CurrentEmulation", ValueType::Object(Some("Emulation")), |m| {
                Ok(Value::Object(m.current()))
            })
            .getter("Version", ValueType::String, |_| {
                Ok(Value::String(env!("CARGO_PKG_VERSION").to_string()))
            })
            .build(),
    );

    registry.register::<Emulation>(
        TypeInfoBuilder::<Emulation>::new("Emulation")
            .getter("MachinesCount", ValueType::Int(IntKind::I32), |e| {
                Ok(Value::Int(e.machine_count() as i64))
            })
            .method("GetMachineNames", vec![], ValueType::Array(Box::new(ValueType::String)), |e, _| {
                Ok(Value::List(e.machine_names().into_iter().map(Value::String).collect()))
            })
            .method("StartAll", vec![], ValueType::Void, |e, _| {
                e.start_all();
                Ok(Value::Null)
            })
            .method("PauseAll", vec![], ValueType::Void, |e, _| {
                e.pause_all();
                Ok(Value::Null)
            })
            .build(),
    );

    registry.register::<Machine>(
        TypeInfoBuilder::<Machine>::new("Machine")
            .getter("Name", ValueType::String, |m| Ok(Value::String(m.name().to_string())))
            .getter("IsPaused", ValueType::Bool, |m| Ok(Value::Bool(m.is_paused())))
            .method("Start", vec![], ValueType::Void, |m, _| {
                m.start();
                Ok(Value::Null)
            })
            .method("Pause", vec![], ValueType::Void, |m, _| {
                m.pause();
                Ok(Value::Null)
            })
            .method("Reset", vec![], ValueType::Void, |m, _| {
                m.reset();
                Ok(Value::Null)
            })
            .method("GetPeripheralNames", vec![], ValueType::Array(Box::new(ValueType::String)), |m, _| {
                Ok(Value::List(m.peripheral_names().into_iter().map(Value::String).collect()))
            })
            .build(),
    );

    registry.register::<SystemBus>(
        TypeInfoBuilder::<SystemBus>::new("SystemBus")
            .implements(PERIPHERAL)
            .method("ReadByte", vec![u64_param("address")], ValueType::Int(IntKind::U8), |b, args| {
                Ok(Value::Int(i64::from(b.read_byte(address_arg(args, 0)?))))
            })
            .method(
                "WriteByte",
                vec![u64_param("address"), ParamSpec::new("value", ValueType::Int(IntKind::U8))],
                ValueType::Void,
                |b, args| {
                    let value = args.get(1).and_then(Value::as_int).unwrap_or(0) as u8;
                    b.write_byte(address_arg(args, 0)?, value);
                    Ok(Value::Null)
                },
            )
            .method("ReadDoubleWord", vec![u64_param("address")], ValueType::Int(IntKind::U32), |b, args| {
                Ok(Value::Int(i64::from(b.read_double_word(address_arg(args, 0)?))))
            })
            .method(
                "WriteDoubleWord",
                vec![u64_param("address"), ParamSpec::new("value", ValueType::Int(IntKind::U32))],
                ValueType::Void,
                |b, args| {
                    let value = args.get(1).and_then(Value::as_int).unwrap_or(0) as u32;
                    b.write_double_word(address_arg(args, 0)?, value);
                    Ok(Value::Null)
                },
            )
            .build(),
    );

    registry.register::<PeripheralsGroup>(
        TypeInfoBuilder::<PeripheralsGroup>::new("PeripheralsGroup")
            .implements(PERIPHERALS_GROUP)
            .getter("Name", ValueType::String, |g| Ok(Value::String(g.name().to_string())))
            .getter("Count", ValueType::Int(IntKind::I32), |g| Ok(Value::Int(g.members().len() as i64)))
            .method("GetMemberNames", vec![], ValueType::Array(Box::new(ValueType::String)), |g, _| {
                Ok(Value::List(
                    g.members()
                        .iter()
                        .map(|(name, _)| Value::String(name.clone()))
                        .collect(),
                ))
            })
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use monitor_types::member::ObjectRef;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        register_types(&mut registry);
        registry
    }

    #[test]
    fn all_types_registered() {
        let registry = registry();
        assert_eq!(registry.len(), 5);
        let bus: ObjectRef = Arc::new(SystemBus::new());
        assert!(registry.is_instance(&*bus, PERIPHERAL));
        assert_eq!(registry.type_name(&*bus), "SystemBus");
    }

    #[test]
    fn system_bus_methods_roundtrip_through_table() {
        let registry = registry();
        let bus: ObjectRef = Arc::new(SystemBus::new());
        let info = registry.type_of(&*bus).unwrap();
        let write = info.methods_named("WriteDoubleWord").next().unwrap();
        (write.call)(&bus, &[Value::Int(0x40), Value::Int(0x1234_5678)]).unwrap();
        let read = info.methods_named("ReadDoubleWord").next().unwrap();
        assert_eq!((read.call)(&bus, &[Value::Int(0x40)]).unwrap(), Value::Int(0x1234_5678));
    }

    #[test]
    fn machine_reset_sets_request() {
        let registry = registry();
        let machine = Arc::new(Machine::new("m"));
        let object: ObjectRef = Arc::clone(&machine) as ObjectRef;
        let info = registry.type_of(&*object).unwrap();
        let reset = info.methods_named("Reset").next().unwrap();
        (reset.call)(&object, &[]).unwrap();
        assert!(machine.take_reset_request());
    }

    #[test]
    fn manager_clear_through_table() {
        let registry = registry();
        let manager = Arc::new(EmulationManager::default());
        let object: ObjectRef = Arc::clone(&manager) as ObjectRef;
        let info = registry.type_of(&*object).unwrap();
        assert!(info.has_member("Clear"));
        let clear = info.methods_named("Clear").next().unwrap();
        (clear.call)(&object, &[]).unwrap();
        assert_eq!(manager.generation(), 1);
    }
}
