// src/health/registry.rs
use super::probe::Probe;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("health probe '{0}' is already registered")]
    DuplicateName(String),
}

#[derive(Clone)]
pub struct RegisteredProbe {
    pub name: String,
    pub probe: Arc<dyn Probe>,
}

impl std::fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProbe")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of named probes.
///
/// Populated at startup, then shared read-only (`Arc<ProbeRegistry>`) with
/// every aggregation run.
#[derive(Debug, Default, Clone)]
pub struct ProbeRegistry {
    probes: Vec<RegisteredProbe>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, name: impl Into<String>, probe: P) -> Result<(), RegistryError>
    where
        P: Probe,
    {
        self.register_arc(name, Arc::new(probe))
    }

    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        tracing::debug!(probe = %name, "registered health probe");
        self.probes.push(RegisteredProbe { name, probe });
        Ok(())
    }

    /// Probes in registration order.
    pub fn probes(&self) -> &[RegisteredProbe] {
        &self.probes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|p| p.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.probes.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
