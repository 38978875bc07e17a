//! The emulation session: machines, externals and the manager that swaps
//! whole emulations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use monitor_types::error::{MonitorError, Result};
use monitor_types::member::{MonitorObject, ObjectRef};

use crate::fetch::{FileFetcher, HttpFileFetcher};
use crate::machine::Machine;

// ---------------------------------------------------------------------------
// Externals
// ---------------------------------------------------------------------------

/// Process-wide objects that live outside any machine (hubs, host bridges).
#[derive(Default)]
pub struct ExternalsManager {
    externals: RwLock<BTreeMap<String, ObjectRef>>,
}

impl ExternalsManager {
    pub fn add(&self, name: &str, object: ObjectRef) -> Result<()> {
        let mut externals = self.externals.write();
        if externals.contains_key(name) {
            return Err(MonitorError::recoverable(format!(
                "External {name} is already registered"
            )));
        }
        externals.insert(name.to_string(), object);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<ObjectRef> {
        self.externals.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<ObjectRef> {
        self.externals.read().get(name).map(Arc::clone)
    }

    pub fn names(&self) -> Vec<String> {
        self.externals.read().keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Emulation
// ---------------------------------------------------------------------------

/// A set of machines plus externals, replaced as a whole by the manager.
pub struct Emulation {
    machines: RwLock<Vec<Arc<Machine>>>,
    externals: ExternalsManager,
}

impl Default for Emulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulation {
    pub fn new() -> Self {
        Self {
            machines: RwLock::new(Vec::new()),
            externals: ExternalsManager::default(),
        }
    }

    pub fn add_machine(&self, machine: Arc<Machine>) -> Result<()> {
        let mut machines = self.machines.write();
        if machines.iter().any(|m| m.name() == machine.name()) {
            return Err(MonitorError::recoverable(format!(
                "Machine {} already exists",
                machine.name()
            )));
        }
        log::info!("added machine {}", machine.name());
        machines.push(machine);
        Ok(())
    }

    /// Create and add a machine; without a name one is generated.
    pub fn create_machine(&self, name: Option<&str>) -> Result<Arc<Machine>> {
        let name = match name {
            Some(n) => n.to_string(),
            None => {
                let machines = self.machines.read();
                (0..)
                    .map(|i| format!("machine-{i}"))
                    .find(|candidate| !machines.iter().any(|m| m.name() == candidate))
                    .unwrap_or_default()
            }
        };
        let machine = Arc::new(Machine::new(&name));
        self.add_machine(Arc::clone(&machine))?;
        Ok(machine)
    }

    pub fn remove_machine(&self, name: &str) -> Result<Arc<Machine>> {
        let mut machines = self.machines.write();
        let index = machines
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| MonitorError::recoverable(format!("No machine named {name}")))?;
        log::info!("removed machine {name}");
        Ok(machines.remove(index))
    }

    pub fn machine(&self, name: &str) -> Option<Arc<Machine>> {
        self.machines
            .read()
            .iter()
            .find(|m| m.name() == name)
            .map(Arc::clone)
    }

    pub fn machine_at(&self, index: usize) -> Option<Arc<Machine>> {
        self.machines.read().get(index).map(Arc::clone)
    }

    pub fn machines(&self) -> Vec<Arc<Machine>> {
        self.machines.read().clone()
    }

    pub fn machine_names(&self) -> Vec<String> {
        self.machines
            .read()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.read().len()
    }

    pub fn externals(&self) -> &ExternalsManager {
        &self.externals
    }

    pub fn start_all(&self) {
        for machine in self.machines() {
            machine.start();
        }
    }

    pub fn pause_all(&self) {
        for machine in self.machines() {
            machine.pause();
        }
    }
}

impl MonitorObject for Emulation {
    fn label(&self) -> String {
        format!("emulation with {} machine(s)", self.machine_count())
    }
}

// ---------------------------------------------------------------------------
// EmulationManager
// ---------------------------------------------------------------------------

/// Owner of the current [`Emulation`]. Every replacement bumps a generation
/// counter so the monitor can notice and reset its session.
pub struct EmulationManager {
    current: RwLock<Arc<Emulation>>,
    generation: AtomicU64,
    fetcher: Arc<dyn FileFetcher>,
}

impl Default for EmulationManager {
    fn default() -> Self {
        Self::new(Arc::new(HttpFileFetcher::new()))
    }
}

impl EmulationManager {
    pub fn new(fetcher: Arc<dyn FileFetcher>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Emulation::new())),
            generation: AtomicU64::new(0),
            fetcher,
        }
    }

    pub fn current(&self) -> Arc<Emulation> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a different emulation.
    pub fn replace(&self, emulation: Emulation) {
        *self.current.write() = Arc::new(emulation);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("emulation replaced (generation {generation})");
    }

    /// Drop every machine and external by starting over with an empty emulation.
    pub fn clear(&self) {
        self.replace(Emulation::new());
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn fetcher(&self) -> &Arc<dyn FileFetcher> {
        &self.fetcher
    }
}

impl MonitorObject for EmulationManager {
    fn label(&self) -> String {
        "EmulationManager".to_string()
    }
}
