//! Component registry (C3): register-once, then resolve participant handles
//! by id for a Submit/advance call.
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use tcc_core::TccError;
use tcc_participant::Participant;

/// Concurrent map from component id to participant handle. Reads (lookups
/// during Submit) vastly outnumber writes (registration at startup), hence
/// the reader-writer lock rather than a single mutex.
#[derive(Default)]
pub struct Registry {
    components: RwLock<HashMap<String, Arc<dyn Participant>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant under its own [`Participant::id`]. Fails if a
    /// component with that id is already registered; registrations are not
    /// replaceable.
    pub fn register(&self, participant: Arc<dyn Participant>) -> Result<(), TccError> {
        let mut components = self.components.write();
        if components.contains_key(participant.id()) {
            return Err(TccError::AlreadyRegistered(participant.id().to_string()));
        }
        components.insert(participant.id().to_string(), participant);
        Ok(())
    }

    /// Resolve every id in `component_ids`, in order. Fails on the first
    /// unknown id rather than returning a partial set, so a Submit never
    /// runs Try against some branches only to discover another is missing.
    pub fn lookup(&self, component_ids: &[String]) -> Result<Vec<Arc<dyn Participant>>, TccError> {
        let components = self.components.read();
        component_ids
            .iter()
            .map(|id| {
                components
                    .get(id)
                    .cloned()
                    .ok_or_else(|| TccError::UnknownComponent(id.clone()))
            })
            .collect()
    }
}
