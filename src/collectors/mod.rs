//! Built-in host collectors
//!
//! Every collector here reads from `sysinfo`. They are opaque to the
//! orchestrator: each one only implements [`Collector`](crate::collector::Collector)
//! (and [`AsyncCollector`](crate::collector::AsyncCollector) for `cpu`).
//!
//! | name         | kind  | default  |
//! |--------------|-------|----------|
//! | `cpu`        | async | enabled  |
//! | `filesystem` | sync  | disabled |
//! | `loadavg`    | sync  | enabled  |
//! | `memory`     | sync  | enabled  |
//! | `netdev`     | sync  | enabled  |
//! | `thermal`    | sync  | enabled  |
//! | `uname`      | sync  | enabled  |

use std::time::Duration;

use crate::error::RegistryError;
use crate::registry::Registry;

pub mod cpu;
pub mod filesystem;
pub mod loadavg;
pub mod memory;
pub mod netdev;
pub mod thermal;
pub mod uname;

pub use cpu::CpuCollector;
pub use filesystem::FilesystemCollector;
pub use loadavg::LoadavgCollector;
pub use memory::MemoryCollector;
pub use netdev::NetdevCollector;
pub use thermal::ThermalCollector;
pub use uname::UnameCollector;

/// Register every built-in collector, naming their metrics under `namespace`
pub fn register_builtin(
    registry: &Registry,
    namespace: &str,
    cpu_interval: Duration,
) -> Result<(), RegistryError> {
    let ns = namespace.to_string();
    registry.register_async("cpu", true, move |_| Ok(CpuCollector::new(&ns, cpu_interval)))?;

    let ns = namespace.to_string();
    registry.register("filesystem", false, move |_| Ok(FilesystemCollector::new(&ns)))?;

    let ns = namespace.to_string();
    registry.register("loadavg", true, move |_| Ok(LoadavgCollector::new(&ns)))?;

    let ns = namespace.to_string();
    registry.register("memory", true, move |_| Ok(MemoryCollector::new(&ns)))?;

    let ns = namespace.to_string();
    registry.register("netdev", true, move |_| Ok(NetdevCollector::new(&ns)))?;

    let ns = namespace.to_string();
    registry.register("thermal", true, move |span| Ok(ThermalCollector::new(&ns, span)))?;

    let ns = namespace.to_string();
    registry.register("uname", true, move |_| Ok(UnameCollector::new(&ns)))?;

    Ok(())
}
