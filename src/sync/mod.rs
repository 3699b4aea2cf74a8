pub mod inflight;
pub mod planning_api;
pub mod sync_engine;

pub use inflight::{ActionKey, InFlightRegistry, InFlightToken};
pub use planning_api::{ApiError, CreatedEvent, HttpPlanningClient, InvitationRecord, PlanningApi};
pub use sync_engine::{ApplyOutcome, SyncEngine, SyncError};
