//! Behavior tests for the reconciler.
//!
//! Each file covers one group of rules, driven through the public
//! [`Reconciler`](crate::Reconciler) API with in-memory ports:
//!
//! - `harness.rs`   - Test harness wiring store, recording client and clock
//! - `intake.rs`    - I. Intake (Rules 1-4, 27)
//! - `creation.rs`  - II. Spreadsheet Creation (Rules 5-10, 26)
//! - `updates.rs`   - III. Updates & Failures (Rules 11-14)
//! - `ordering.rs`  - IV. Ordering (Rules 15-17)
//! - `backlog.rs`   - V. Backlog & Draining (Rules 18-21)
//! - `lifecycle.rs` - VI. Lifecycle & Admin Toggles (Rules 22-25)
//!
//! Timing-sensitive rules run on tokio's paused clock.

pub(crate) mod harness;
mod intake;
mod updates;

#[allow(unused_imports)]
pub use harness::{fast_config, TestHarness};
