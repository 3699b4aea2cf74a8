use chrono::{Datelike, Days, NaiveDate};

use crate::app::PlannerState;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Week>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Week {
    pub days: Vec<DayCell>,
}

/// One rendered calendar position. Cells outside the target month keep their
/// real date (for numbering) but are non-interactive and never carry marks.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub has_events: bool,
    pub badges: Vec<EventBadge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBadge {
    pub event_id: i64,
    pub title: String,
    pub color: String,
}

impl DayCell {
    fn other_month(date: NaiveDate) -> Self {
        Self {
            date,
            in_month: false,
            is_today: false,
            has_events: false,
            badges: Vec::new(),
        }
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

impl MonthGrid {
    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flat_map(|w| w.days.iter())
    }

    pub fn cell_count(&self) -> usize {
        self.weeks.iter().map(|w| w.days.len()).sum()
    }
}

/// Builds the month grid: Monday-first weeks, five rows, plus a sixth only
/// when the weekday offset and month length overflow 35 cells. Leading and
/// trailing cells carry the actual dates of the adjacent months.
pub fn build_month_grid(
    year: i32,
    month: u32,
    today: NaiveDate,
    state: &PlannerState,
) -> MonthGrid {
    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return MonthGrid {
            year,
            month,
            weeks: Vec::new(),
        };
    };

    let offset = first_day.weekday().num_days_from_monday();
    let month_length = days_in_month(year, month);
    let rows = if offset + month_length > 35 { 6 } else { 5 };

    let Some(grid_start) = first_day.checked_sub_days(Days::new(offset as u64)) else {
        return MonthGrid {
            year,
            month,
            weeks: Vec::new(),
        };
    };

    let mut weeks: Vec<Week> = Vec::with_capacity(rows);
    let mut week = Week {
        days: Vec::with_capacity(7),
    };

    for date in grid_start.iter_days().take(rows * 7) {
        week.days.push(build_cell(date, year, month, today, state));
        if week.days.len() == 7 {
            weeks.push(week);
            week = Week {
                days: Vec::with_capacity(7),
            };
        }
    }

    MonthGrid { year, month, weeks }
}

fn build_cell(
    date: NaiveDate,
    year: i32,
    month: u32,
    today: NaiveDate,
    state: &PlannerState,
) -> DayCell {
    if date.year() != year || date.month() != month {
        return DayCell::other_month(date);
    }

    let badges: Vec<EventBadge> = state
        .events_on_day(date)
        .iter()
        .map(|event| EventBadge {
            event_id: event.id,
            title: event.title.clone(),
            color: event.color.clone(),
        })
        .collect();

    DayCell {
        date,
        in_month: true,
        is_today: date == today,
        has_events: !badges.is_empty(),
        badges,
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    next_month_first
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(30)
}
