// SPDX-License-Identifier: MIT OR Apache-2.0
//! Platform-keyed adapter registry used by the engine.

use bas_adapter::PlatformAdapter;
use bas_core::Platform;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One [`PlatformAdapter`] per [`Platform`].
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    /// Register `adapter` under its own platform, returning any adapter it replaced.
    pub fn register(
        &mut self,
        adapter: Arc<dyn PlatformAdapter>,
    ) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.insert(adapter.platform(), adapter)
    }

    /// Shared handle to the adapter for `platform`.
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Registered platforms in declaration order.
    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
