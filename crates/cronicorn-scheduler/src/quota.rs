//! The quota guard external collaborator (spec §6: `canProceed(tenantId) ->
//! bool`), consulted before each dispatch. Grounded on the teacher's
//! `QuotaTracker` (`crates/gateway/src/runtime/quota.rs`) — same
//! check-before-proceed shape, generalized from per-agent token/cost
//! counters to a tenant-scoped boolean gate since the spec only describes
//! the external interface, not the limiter's internals.

use async_trait::async_trait;

/// `Ok(true)` to proceed, `Ok(false)` to deny (spec: "If denied, release
/// the lease... and skip").
#[async_trait]
pub trait QuotaGuard: Send + Sync {
    async fn can_proceed(&self, tenant_id: &str) -> bool;
}

/// No-op guard: every tenant always has quota. The default when no quota
/// backend is wired in — single-tenant deployments and tests.
pub struct AllowAll;

#[async_trait]
impl QuotaGuard for AllowAll {
    async fn can_proceed(&self, _tenant_id: &str) -> bool {
        true
    }
}
