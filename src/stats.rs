use crate::errors::RoutineError;
use crate::models::{AppData, CalendarDay, DayView, MonthResponse, OverallPoint, WeekPoint, WeeklyStatsResponse};
use chrono::{Datelike, Duration, Local, NaiveDate};

const WEEK_COUNT: i64 = 4;
const LOOKBACK_DAYS: i64 = 28;

pub fn build_weekly_stats(data: &AppData, user_id: &str) -> WeeklyStatsResponse {
    build_weekly_stats_at(Local::now().date_naive(), data, user_id)
}

#[derive(Default)]
struct Tally {
    days: usize,
    instances: usize,
    completed: usize,
    discipline_sum: u32,
}

impl Tally {
    fn add(&mut self, data: &AppData, day: &CalendarDay) {
        let instances = data.instances_of(day.id);
        self.days += 1;
        self.completed += instances
            .iter()
            .filter(|instance| data.checks.get(&instance.id).is_some_and(|c| c.is_completed))
            .count();
        self.instances += instances.len();
        self.discipline_sum += data
            .scores
            .get(&day.id)
            .map(|score| score.discipline_rating)
            .unwrap_or(0);
    }

    fn completion_percent(&self) -> u32 {
        if self.instances == 0 {
            return 0;
        }
        (100.0 * self.completed as f64 / self.instances as f64).round() as u32
    }

    fn average_discipline(&self) -> u32 {
        if self.days == 0 {
            return 0;
        }
        (f64::from(self.discipline_sum) / self.days as f64).round() as u32
    }
}

/// Four trailing 7-day windows ending at `today`, oldest first, plus totals
/// over the last 28 days.
pub fn build_weekly_stats_at(today: NaiveDate, data: &AppData, user_id: &str) -> WeeklyStatsResponse {
    let lookback_start = today - Duration::days(LOOKBACK_DAYS);
    let mut days: Vec<&CalendarDay> = data
        .calendar_days
        .values()
        .filter(|day| day.user_id == user_id && day.date >= lookback_start && day.date <= today)
        .collect();
    days.sort_by_key(|day| day.date);

    let mut weeks = Vec::with_capacity(WEEK_COUNT as usize);
    for offset in (0..WEEK_COUNT).rev() {
        let end = today - Duration::days(offset * 7);
        let start = end - Duration::days(6);

        let mut tally = Tally::default();
        for day in days.iter().filter(|day| day.date >= start && day.date <= end) {
            tally.add(data, day);
        }

        weeks.push(WeekPoint {
            week_num: (offset + 1) as u8,
            week_start: start.to_string(),
            week_end: end.to_string(),
            days_with_routines: tally.days,
            total_instances: tally.instances,
            completed_instances: tally.completed,
            completion_percent: tally.completion_percent(),
            average_discipline: tally.average_discipline(),
        });
    }

    let mut overall = Tally::default();
    for day in &days {
        overall.add(data, day);
    }

    WeeklyStatsResponse {
        weeks,
        overall: OverallPoint {
            days_with_routines: overall.days,
            completion_percent: overall.completion_percent(),
            average_discipline: overall.average_discipline(),
        },
    }
}

pub fn build_month(
    data: &AppData,
    user_id: &str,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<MonthResponse, RoutineError> {
    let today = Local::now().date_naive();
    build_month_at(today, data, user_id, year, month)
}

pub fn build_month_at(
    today: NaiveDate,
    data: &AppData,
    user_id: &str,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<MonthResponse, RoutineError> {
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| RoutineError::validation("month must be between 1 and 12"))?;
    let end = month_end(start);

    let mut days: Vec<&CalendarDay> = data
        .calendar_days
        .values()
        .filter(|day| day.user_id == user_id && day.date >= start && day.date <= end)
        .collect();
    days.sort_by_key(|day| day.date);

    Ok(MonthResponse {
        year,
        month,
        days: days.into_iter().map(|day| data.day_view(day)).collect::<Vec<DayView>>(),
    })
}

fn month_end(start: NaiveDate) -> NaiveDate {
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| next - Duration::days(1))
        .unwrap_or(start)
}
