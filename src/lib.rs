pub mod app;
pub mod planning;
pub mod storage;
pub mod sync;
pub mod ui;

pub use app::{InvitationView, PlannerState};
pub use planning::{Association, Event, Invitation, InvitationStatus, PlanningError};
pub use sync::{ApplyOutcome, HttpPlanningClient, SyncEngine};
pub use ui::build_month_grid;
