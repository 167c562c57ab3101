//! Council configuration container.
//!
//! [`CouncilConfig`] groups the per-component configuration types so the
//! binary can build every component from one value. Components receive only
//! the slice they need.

use super::{CollaborationConfig, CoordinationConfig, RuntimeConfig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouncilConfig {
    pub runtime: RuntimeConfig,
    pub coordination: CoordinationConfig,
    pub collaboration: CollaborationConfig,
}

impl CouncilConfig {
    pub fn new(
        runtime: RuntimeConfig,
        coordination: CoordinationConfig,
        collaboration: CollaborationConfig,
    ) -> Self {
        Self {
            runtime,
            coordination,
            collaboration,
        }
    }
}
