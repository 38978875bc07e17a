//! The emulation object graph as seen by the Monitor.
//!
//! Machines own a dotted peripheral tree rooted at `sysbus`; externals are
//! process-wide objects outside any machine; the [`EmulationManager`] owns
//! the current [`Emulation`] and can replace it wholesale. Peripheral
//! models are supplied by the embedding application.

pub mod emulation;
pub mod fetch;
pub mod machine;
pub mod types;

pub use emulation::{Emulation, EmulationManager, ExternalsManager};
pub use fetch::{FileFetcher, HttpFileFetcher, is_uri};
pub use machine::{Machine, PeripheralsGroup, SYSBUS, SystemBus, scope_name};
pub use types::{EXTERNAL, PERIPHERAL, PERIPHERALS_GROUP, register_types};
