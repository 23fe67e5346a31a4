//! Chain-agnostic sync machinery shared by every rover.
//!
//! A rover is wired as one control-loop task ([`rover_task`]) owning a
//! [`RequestTracker`], fed by a chain io driver over the [`ChainDriver`]
//! seam. The planner turns parent directives into bounded batches; the
//! tracker dispatches them under peer-availability constraints and detects
//! completion; the control loop translates validated foreign blocks and
//! emits them upstream.

mod cache;
mod control;
mod driver;
mod errors;
mod planner;
mod state;
mod tracker;

pub use cache::BoundedCache;
pub use control::{rover_task, CoordinatorClient, RoverCtx};
pub use driver::{ChainDriver, RoverEvent};
pub use errors::{DriverError, UpstreamError};
pub use planner::{clamp_recent, plan_resync, split_interval, Batch};
pub use state::SyncState;
pub use tracker::{PumpOutcome, RequestTracker};
