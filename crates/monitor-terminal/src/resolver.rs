//! Turning names typed by the user into live objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use monitor_emulation::emulation::{Emulation, EmulationManager};
use monitor_emulation::machine::Machine;
use monitor_types::error::{MonitorError, Result};
use monitor_types::member::ObjectRef;

use crate::coerce::ObjectLookup;

/// What a binding closure can see.
pub struct BindingContext<'a> {
    pub manager: &'a Arc<EmulationManager>,
    pub emulation: &'a Arc<Emulation>,
    pub machine: Option<&'a Arc<Machine>>,
}

pub type Binding = Box<dyn Fn(&BindingContext<'_>) -> Option<ObjectRef>>;

/// Names bound to objects by closure rather than by registration.
///
/// Static bindings always apply; dynamic ones only while a machine is
/// selected.
#[derive(Default)]
pub struct Bindings {
    fixed: BTreeMap<String, Binding>,
    dynamic: BTreeMap<String, Binding>,
}

impl Bindings {
    /// `emulation` and `EmulationManager` statically, `machine` dynamically.
    pub fn standard() -> Self {
        let mut bindings = Self::default();
        bindings.bind_static("emulation", |ctx| {
            Some(Arc::clone(ctx.emulation) as ObjectRef)
        });
        bindings.bind_static("EmulationManager", |ctx| {
            Some(Arc::clone(ctx.manager) as ObjectRef)
        });
        bindings.bind_dynamic("machine", |ctx| {
            ctx.machine.map(|m| Arc::clone(m) as ObjectRef)
        });
        bindings
    }

    pub fn bind_static<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&BindingContext<'_>) -> Option<ObjectRef> + 'static,
    {
        self.fixed.insert(name.to_string(), Box::new(f));
    }

    pub fn bind_dynamic<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&BindingContext<'_>) -> Option<ObjectRef> + 'static,
    {
        self.dynamic.insert(name.to_string(), Box::new(f));
    }

    fn resolve(&self, name: &str, ctx: &BindingContext<'_>) -> Option<ObjectRef> {
        if let Some(binding) = self.fixed.get(name) {
            return binding(ctx);
        }
        if ctx.machine.is_some() {
            return self.dynamic.get(name).and_then(|binding| binding(ctx));
        }
        None
    }

    fn names(&self, with_dynamic: bool) -> Vec<String> {
        let mut names: Vec<String> = self.fixed.keys().cloned().collect();
        if with_dynamic {
            names.extend(self.dynamic.keys().cloned());
        }
        names
    }
}

/// A resolved object plus the name it was reached by.
#[derive(Clone)]
pub struct ResolvedTarget {
    pub object: ObjectRef,
    pub name: String,
}

/// One resolution pass over the current session state.
pub struct NameResolver<'a> {
    pub(crate) bindings: &'a Bindings,
    pub(crate) manager: &'a Arc<EmulationManager>,
    pub(crate) emulation: Arc<Emulation>,
    pub(crate) machine: Option<&'a Arc<Machine>>,
    pub(crate) usings: &'a [String],
}

impl NameResolver<'_> {
    /// Resolve through bindings, externals, groups and peripherals in turn.
    pub fn resolve(&self, name: &str) -> Result<ResolvedTarget> {
        let ctx = BindingContext {
            manager: self.manager,
            emulation: &self.emulation,
            machine: self.machine,
        };
        if let Some(object) = self.bindings.resolve(name, &ctx) {
            return Ok(target(object, name));
        }
        if let Some(object) = self.emulation.externals().get(name) {
            return Ok(target(object, name));
        }
        if let Some(group) = self.machine.and_then(|m| m.group(name)) {
            return Ok(target(group, name));
        }
        self.find_peripheral(name)
    }

    /// Peripheral lookup with alias prefixes. On failure the error names the
    /// deepest partial match.
    pub fn find_peripheral(&self, name: &str) -> Result<ResolvedTarget> {
        let Some(machine) = self.machine else {
            return Err(not_found(name, None));
        };
        let (found, longest) = machine.try_get_by_name(name);
        if let Some(object) = found {
            return Ok(target(object, name));
        }

        let mut best_depth = depth(&longest);
        let mut best = longest;
        for prefix in self.usings {
            let full = format!("{prefix}{name}");
            let (found, longest) = machine.try_get_by_name(&full);
            if let Some(object) = found {
                log::debug!("{name} resolved as {full}");
                return Ok(target(object, &full));
            }
            let beyond = depth(&longest).saturating_sub(depth(prefix.trim_end_matches('.')));
            if beyond > best_depth {
                best_depth = beyond;
                best = longest;
            }
        }
        Err(not_found(name, (!best.is_empty()).then_some(best)))
    }

    /// Every name this resolver accepts, including alias-stripped forms.
    pub fn available_names(&self) -> Vec<String> {
        let mut names = self.bindings.names(self.machine.is_some());
        names.extend(self.emulation.externals().names());
        if let Some(machine) = self.machine {
            names.extend(machine.group_names());
            for peripheral in machine.peripheral_names() {
                for prefix in self.usings {
                    if let Some(short) = peripheral.strip_prefix(prefix.as_str()) {
                        names.push(short.to_string());
                    }
                }
                names.push(peripheral);
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

impl ObjectLookup for NameResolver<'_> {
    fn find_object(&self, name: &str) -> Option<ObjectRef> {
        if let Some(object) = self.emulation.externals().get(name) {
            return Some(object);
        }
        if let Some(group) = self.machine.and_then(|m| m.group(name)) {
            return Some(group as ObjectRef);
        }
        self.find_peripheral(name).ok().map(|t| t.object)
    }
}

fn target(object: ObjectRef, name: &str) -> ResolvedTarget {
    ResolvedTarget {
        object,
        name: name.to_string(),
    }
}

fn not_found(name: &str, longest_match: Option<String>) -> MonitorError {
    MonitorError::NoSuchCommandOrDevice {
        name: name.to_string(),
        longest_match,
    }
}

fn depth(name: &str) -> usize {
    if name.is_empty() { 0 } else { name.split('.').count() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::member::MonitorObject;

    struct Stub;
    impl MonitorObject for Stub {}

    fn machine() -> Arc<Machine> {
        let machine = Arc::new(Machine::new("board"));
        machine.register("sysbus.uart0", Arc::new(Stub)).unwrap();
        machine.register("sysbus.gpio", Arc::new(Stub)).unwrap();
        machine.register("sysbus.gpio.led", Arc::new(Stub)).unwrap();
        machine
    }

    fn check<F: FnOnce(&NameResolver<'_>)>(machine: Option<&Arc<Machine>>, usings: &[String], f: F) {
        let manager = Arc::new(EmulationManager::default());
        let bindings = Bindings::standard();
        let resolver = NameResolver {
            bindings: &bindings,
            manager: &manager,
            emulation: manager.current(),
            machine,
            usings,
        };
        f(&resolver);
    }

    #[test]
    fn static_bindings_always_resolve() {
        check(None, &[], |r| {
            assert_eq!(r.resolve("emulation").unwrap().name, "emulation");
            assert!(r.resolve("EmulationManager").is_ok());
            assert!(r.resolve("machine").is_err());
        });
    }

    #[test]
    fn dynamic_binding_needs_a_machine() {
        let m = machine();
        check(Some(&m), &[], |r| {
            let t = r.resolve("machine").unwrap();
            assert!(Arc::ptr_eq(&t.object, &(Arc::clone(&m) as ObjectRef)));
        });
    }

    #[test]
    fn usings_resolve_short_names() {
        let m = machine();
        let usings = vec!["sysbus.".to_string()];
        check(Some(&m), &usings, |r| {
            assert_eq!(r.resolve("uart0").unwrap().name, "sysbus.uart0");
            assert_eq!(r.resolve("gpio.led").unwrap().name, "sysbus.gpio.led");
            assert!(r.available_names().contains(&"uart0".to_string()));
            assert!(r.find_object("uart0").is_some());
        });
    }

    #[test]
    fn failure_reports_deepest_partial_match() {
        let m = machine();
        let usings = vec!["sysbus.".to_string()];
        check(Some(&m), &usings, |r| {
            let err = r.resolve("gpio.button").err().unwrap();
            assert_eq!(
                err.to_string(),
                "No such command or device: gpio.button, the longest match is sysbus.gpio"
            );
            let err = r.resolve("uart9").err().unwrap();
            assert_eq!(err.to_string(), "No such command or device: uart9");
        });
    }

    #[test]
    fn without_usings_longest_direct_prefix_is_reported() {
        let m = machine();
        check(Some(&m), &[], |r| {
            let err = r.resolve("sysbus.gpio.button").err().unwrap();
            assert!(matches!(
                err,
                MonitorError::NoSuchCommandOrDevice { longest_match: Some(ref l), .. } if l == "sysbus.gpio"
            ));
        });
    }
}
