pub mod month_view;

pub use month_view::{build_month_grid, DayCell, EventBadge, MonthGrid, Week};
