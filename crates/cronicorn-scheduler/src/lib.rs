//! The scheduler tick (C9): orchestrates claim → dispatch → record → update
//! across worker tasks, plus the zombie sweeper that recovers crashed
//! dispatches (spec §4.3).

pub mod quota;
pub mod tick;
pub mod worker;

pub use quota::{AllowAll, QuotaGuard};
pub use tick::{run_tick, ClaimOutcome, TickContext};
pub use worker::{run_worker_loop, run_zombie_sweeper};
