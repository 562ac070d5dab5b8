//! In-process signing-key registry (spec §6 "Signing-key lookup" upstream
//! collaborator). A production deployment backs this with the
//! `signing_keys(tenantId)` table from spec §6's persisted-state layout;
//! this implementation keeps it in memory behind a `parking_lot::RwLock`,
//! matching the teacher's preference for `parking_lot` over `std::sync`
//! locks on hot, short-held read paths.

use std::collections::HashMap;

use cronicorn_dispatcher::SigningKeyLookup;
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemorySigningKeys {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySigningKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&self, tenant_id: impl Into<String>, key: Vec<u8>) {
        self.keys.write().insert(tenant_id.into(), key);
    }

    pub fn remove_key(&self, tenant_id: &str) {
        self.keys.write().remove(tenant_id);
    }
}

#[async_trait::async_trait]
impl SigningKeyLookup for InMemorySigningKeys {
    async fn get_key(&self, tenant_id: &str) -> Result<Option<Vec<u8>>, String> {
        Ok(self.keys.read().get(tenant_id).cloned())
    }
}
