/// Working days shown in a week view (Monday..Friday).
pub const WEEKDAYS_PER_WEEK: usize = 5;

/// Entries kept in each "most booked" ranking.
pub const TOP_RESOURCES: usize = 5;

/// Length of the rolling activity timeline, in days.
pub const TIMELINE_DAYS: usize = 7;

/// Widest date window a statistics snapshot may cover.
pub const MAX_STATS_WINDOW_DAYS: i64 = 366;

/// Horizon of the personal dashboard, in days after today.
pub const DASHBOARD_HORIZON_DAYS: i64 = 7;

/// Upcoming bookings listed on the dashboard.
pub const DASHBOARD_UPCOMING: usize = 5;
