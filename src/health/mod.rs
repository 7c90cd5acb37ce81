// src/health/mod.rs
mod aggregator;
mod probe;
pub mod probes;
mod registry;
mod report;

pub use aggregator::{Aggregator, TIMEOUT_ERROR};
pub use probe::{probe_fn, FnProbe, Probe};
pub use registry::{ProbeRegistry, RegisteredProbe, RegistryError};
pub use report::{HealthReport, HealthStatus, ProbeResult};
