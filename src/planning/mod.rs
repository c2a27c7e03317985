mod dashboard;
mod grid;
mod stats;
mod week;

pub use dashboard::{summarize_dashboard, DashboardSummary, UpcomingBooking};
pub use grid::{build_grid, Cell, CellView, GridReport, GridRow, PlanningGrid};
pub use stats::{compute_stats, ResourceCount, StatsRange, StatsSnapshot, TimelineDay, WeekdayCount};
pub use week::{build_week, week_days, FetchWarning, WeekGrid, WeekReport};
