//! Emulated machines and their peripheral trees.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{MonitorObject, ObjectRef};

/// Name of the root of every peripheral tree.
pub const SYSBUS: &str = "sysbus";

// ---------------------------------------------------------------------------
// System bus
// ---------------------------------------------------------------------------

/// The root peripheral of a machine: a sparse byte-addressed memory map.
#[derive(Default)]
pub struct SystemBus {
    memory: Mutex<BTreeMap<u64, u8>>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_byte(&self, address: u64) -> u8 {
        self.memory.lock().get(&address).copied().unwrap_or(0)
    }

    pub fn write_byte(&self, address: u64, value: u8) {
        self.memory.lock().insert(address, value);
    }

    /// Little-endian 32-bit read.
    pub fn read_double_word(&self, address: u64) -> u32 {
        let memory = self.memory.lock();
        (0..4u64).fold(0u32, |acc, i| {
            let byte = memory.get(&(address + i)).copied().unwrap_or(0);
            acc | (u32::from(byte) << (8 * i))
        })
    }

    /// Little-endian 32-bit write.
    pub fn write_double_word(&self, address: u64, value: u32) {
        let mut memory = self.memory.lock();
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            memory.insert(address + i as u64, byte);
        }
    }
}

impl MonitorObject for SystemBus {
    fn label(&self) -> String {
        SYSBUS.to_string()
    }
}

// ---------------------------------------------------------------------------
// Peripheral groups
// ---------------------------------------------------------------------------

/// A named set of peripherals acted upon together.
pub struct PeripheralsGroup {
    name: String,
    members: Vec<(String, ObjectRef)>,
}

impl PeripheralsGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[(String, ObjectRef)] {
        &self.members
    }
}

impl MonitorObject for PeripheralsGroup {
    fn label(&self) -> String {
        self.name.clone()
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// One emulated machine: a named peripheral tree rooted at `sysbus`.
pub struct Machine {
    name: String,
    peripherals: RwLock<BTreeMap<String, ObjectRef>>,
    groups: RwLock<BTreeMap<String, Arc<PeripheralsGroup>>>,
    paused: AtomicBool,
    reset_requested: AtomicBool,
}

impl Machine {
    /// Create a paused machine holding only its system bus.
    pub fn new(name: &str) -> Self {
        let mut peripherals: BTreeMap<String, ObjectRef> = BTreeMap::new();
        peripherals.insert(SYSBUS.to_string(), Arc::new(SystemBus::new()));
        Self {
            name: name.to_string(),
            peripherals: RwLock::new(peripherals),
            groups: RwLock::new(BTreeMap::new()),
            paused: AtomicBool::new(true),
            reset_requested: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The machine name as a variable scope prefix.
    pub fn scope_name(&self) -> String {
        scope_name(&self.name)
    }

    /// Register `object` as `name`, a dotted child of an existing node.
    pub fn register(&self, name: &str, object: ObjectRef) -> Result<()> {
        let Some((parent, local)) = name.rsplit_once('.') else {
            return Err(MonitorError::recoverable(format!(
                "Peripheral name {name} must be rooted at {SYSBUS}"
            )));
        };
        if local.is_empty() {
            return Err(MonitorError::recoverable(format!("Invalid peripheral name: {name}")));
        }
        let mut peripherals = self.peripherals.write();
        if !peripherals.contains_key(parent) {
            return Err(MonitorError::recoverable(format!(
                "Cannot register {name}: parent {parent} does not exist"
            )));
        }
        if peripherals.contains_key(name) {
            return Err(MonitorError::recoverable(format!(
                "Peripheral {name} is already registered"
            )));
        }
        log::debug!("{}: registered {name}", self.name);
        peripherals.insert(name.to_string(), object);
        Ok(())
    }

    /// Remove a peripheral and everything below it.
    pub fn unregister(&self, name: &str) -> Result<()> {
        if name == SYSBUS {
            return Err(MonitorError::recoverable("Cannot remove the system bus"));
        }
        let mut peripherals = self.peripherals.write();
        if peripherals.remove(name).is_none() {
            return Err(MonitorError::recoverable(format!("No such peripheral: {name}")));
        }
        let prefix = format!("{name}.");
        peripherals.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    /// Look up a dotted name. On failure the second element holds the
    /// longest prefix that did resolve (empty when not even the root did).
    pub fn try_get_by_name(&self, name: &str) -> (Option<ObjectRef>, String) {
        let peripherals = self.peripherals.read();
        if let Some(found) = peripherals.get(name) {
            return (Some(Arc::clone(found)), name.to_string());
        }
        let mut longest = String::new();
        let mut current = String::new();
        for segment in name.split('.') {
            if !current.is_empty() {
                current.push('.');
            }
            current.push_str(segment);
            if peripherals.contains_key(&current) {
                longest.clone_from(&current);
            } else {
                break;
            }
        }
        (None, longest)
    }

    pub fn peripheral(&self, name: &str) -> Option<ObjectRef> {
        self.peripherals.read().get(name).map(Arc::clone)
    }

    /// All registered names, sorted.
    pub fn peripheral_names(&self) -> Vec<String> {
        self.peripherals.read().keys().cloned().collect()
    }

    /// Registered name of `object`, if it belongs to this machine.
    pub fn name_of(&self, object: &ObjectRef) -> Option<String> {
        self.peripherals
            .read()
            .iter()
            .find(|(_, o)| Arc::ptr_eq(o, object))
            .map(|(k, _)| k.clone())
    }

    /// Group existing peripherals under a new name.
    pub fn add_group(&self, name: &str, members: &[&str]) -> Result<()> {
        let mut resolved = Vec::with_capacity(members.len());
        for member in members {
            let object = self.peripheral(member).ok_or_else(|| {
                MonitorError::recoverable(format!("No such peripheral: {member}"))
            })?;
            resolved.push(((*member).to_string(), object));
        }
        let mut groups = self.groups.write();
        if groups.contains_key(name) {
            return Err(MonitorError::recoverable(format!("Group {name} already exists")));
        }
        groups.insert(
            name.to_string(),
            Arc::new(PeripheralsGroup {
                name: name.to_string(),
                members: resolved,
            }),
        );
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<Arc<PeripheralsGroup>> {
        self.groups.read().get(name).map(Arc::clone)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn start(&self) {
        log::info!("{}: starting", self.name);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        log::info!("{}: pausing", self.name);
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Request a reset; the monitor observes it with [`Machine::take_reset_request`].
    pub fn reset(&self) {
        log::info!("{}: reset requested", self.name);
        self.reset_requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reset request.
    pub fn take_reset_request(&self) -> bool {
        self.reset_requested.swap(false, Ordering::SeqCst)
    }
}

impl MonitorObject for Machine {
    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Turn a machine name into a variable scope prefix.
pub fn scope_name(machine_name: &str) -> String {
    machine_name.replace(['.', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;
    impl MonitorObject for Dummy {}

    fn machine() -> Machine {
        let m = Machine::new("board-0");
        m.register("sysbus.uart0", Arc::new(Dummy)).unwrap();
        m.register("sysbus.gpio", Arc::new(Dummy)).unwrap();
        m.register("sysbus.gpio.led", Arc::new(Dummy)).unwrap();
        m
    }

    #[test]
    fn new_machine_has_sysbus() {
        let m = Machine::new("m");
        assert_eq!(m.peripheral_names(), vec!["sysbus"]);
        assert!(m.is_paused());
    }

    #[test]
    fn exact_lookup() {
        let m = machine();
        let (found, longest) = m.try_get_by_name("sysbus.gpio.led");
        assert!(found.is_some());
        assert_eq!(longest, "sysbus.gpio.led");
    }

    #[test]
    fn failed_lookup_reports_longest_match() {
        let m = machine();
        let (found, longest) = m.try_get_by_name("sysbus.gpio.button");
        assert!(found.is_none());
        assert_eq!(longest, "sysbus.gpio");
        let (found, longest) = m.try_get_by_name("uart0");
        assert!(found.is_none());
        assert_eq!(longest, "");
    }

    #[test]
    fn register_requires_parent() {
        let m = machine();
        assert!(m.register("sysbus.spi.flash", Arc::new(Dummy)).is_err());
        assert!(m.register("uart1", Arc::new(Dummy)).is_err());
        assert!(m.register("sysbus.uart0", Arc::new(Dummy)).is_err());
    }

    #[test]
    fn unregister_removes_subtree() {
        let m = machine();
        m.unregister("sysbus.gpio").unwrap();
        assert_eq!(m.peripheral_names(), vec!["sysbus", "sysbus.uart0"]);
        assert!(m.unregister(SYSBUS).is_err());
    }

    #[test]
    fn name_of_finds_registered_object() {
        let m = machine();
        let uart = m.peripheral("sysbus.uart0").unwrap();
        assert_eq!(m.name_of(&uart).as_deref(), Some("sysbus.uart0"));
    }

    #[test]
    fn groups() {
        let m = machine();
        m.add_group("io", &["sysbus.uart0", "sysbus.gpio"]).unwrap();
        assert_eq!(m.group("io").unwrap().members().len(), 2);
        assert!(m.add_group("io", &["sysbus.uart0"]).is_err());
        assert!(m.add_group("bad", &["sysbus.nothing"]).is_err());
        assert_eq!(m.group_names(), vec!["io"]);
    }

    #[test]
    fn reset_request_is_consumed_once() {
        let m = machine();
        m.reset();
        assert!(m.take_reset_request());
        assert!(!m.take_reset_request());
    }

    #[test]
    fn scope_name_replaces_separators() {
        assert_eq!(scope_name("board-0.rev2"), "board_0_rev2");
        assert_eq!(machine().scope_name(), "board_0");
    }

    #[test]
    fn system_bus_little_endian() {
        let bus = SystemBus::new();
        bus.write_double_word(0x100, 0xDEAD_BEEF);
        assert_eq!(bus.read_byte(0x100), 0xEF);
        assert_eq!(bus.read_double_word(0x100), 0xDEAD_BEEF);
        assert_eq!(bus.read_double_word(0x200), 0);
    }
}
