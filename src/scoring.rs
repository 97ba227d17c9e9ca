use crate::errors::RoutineError;
use crate::models::{AppData, DailyScore, DayRoutineCheck, DayRoutineInstance, ToggleResponse};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Weight used for scoring: the instance's own weight, else the live weight of
/// its template item, else 1.
pub fn effective_weight(data: &AppData, instance: &DayRoutineInstance) -> f64 {
    instance
        .custom_weight
        .or_else(|| {
            data.template_items
                .get(&instance.routine_item_id)
                .map(|item| item.default_weight)
        })
        .unwrap_or(1.0)
}

pub fn discipline_rating(achieved: f64, total_possible: f64) -> u32 {
    let ratio = 100.0 * achieved / total_possible.max(1.0);
    ratio.round().clamp(0.0, 100.0) as u32
}

/// Recomputes the day's weighted completion and upserts its score snapshot.
pub fn calculate_daily_score(
    data: &mut AppData,
    calendar_day_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DailyScore, RoutineError> {
    let user_id = data
        .calendar_days
        .get(&calendar_day_id)
        .map(|day| day.user_id.clone())
        .ok_or(RoutineError::DayNotFound)?;

    let mut total_possible = 0.0;
    let mut achieved = 0.0;
    for instance in data.instances_of(calendar_day_id) {
        let weight = effective_weight(data, instance);
        total_possible += weight;
        if data
            .checks
            .get(&instance.id)
            .is_some_and(|check| check.is_completed)
        {
            achieved += weight;
        }
    }

    let rating = discipline_rating(achieved, total_possible);
    let score = data
        .scores
        .entry(calendar_day_id)
        .and_modify(|score| {
            score.total_possible_score = total_possible;
            score.achieved_score = achieved;
            score.discipline_rating = rating;
            score.focus_rating = 0;
            score.calculated_at = now;
        })
        .or_insert_with(|| DailyScore {
            id: Uuid::new_v4(),
            calendar_day_id,
            user_id,
            total_possible_score: total_possible,
            achieved_score: achieved,
            discipline_rating: rating,
            focus_rating: 0,
            calculated_at: now,
        });

    Ok(score.clone())
}

/// Owner-checked entry point for explicit recalculation requests.
pub fn calculate_for_user(
    data: &mut AppData,
    user_id: &str,
    calendar_day_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DailyScore, RoutineError> {
    let day = data
        .calendar_days
        .get(&calendar_day_id)
        .ok_or(RoutineError::DayNotFound)?;
    if day.user_id != user_id {
        return Err(RoutineError::Forbidden);
    }
    calculate_daily_score(data, calendar_day_id, now)
}

/// Recomputes the snapshot only if the day already has one.
pub fn refresh_existing_score(
    data: &mut AppData,
    calendar_day_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<DailyScore>, RoutineError> {
    if !data.scores.contains_key(&calendar_day_id) {
        return Ok(None);
    }
    calculate_daily_score(data, calendar_day_id, now).map(Some)
}

/// Sets or flips an instance's completion and recomputes its day's score in
/// the same pass. With no explicit value a new check starts completed and an
/// existing one is flipped.
pub fn toggle_check(
    data: &mut AppData,
    user_id: &str,
    instance_id: Uuid,
    is_completed: Option<bool>,
    now: DateTime<Utc>,
) -> Result<ToggleResponse, RoutineError> {
    let instance = data
        .instances
        .get(&instance_id)
        .ok_or(RoutineError::InstanceNotFound)?;
    let calendar_day_id = instance.calendar_day_id;
    let owner = data
        .calendar_days
        .get(&calendar_day_id)
        .map(|day| day.user_id.as_str());
    if owner != Some(user_id) {
        return Err(RoutineError::Forbidden);
    }

    let check = match data.checks.get_mut(&instance_id) {
        Some(check) => {
            let completed = is_completed.unwrap_or(!check.is_completed);
            check.is_completed = completed;
            check.completed_at = completed.then_some(now);
            check.clone()
        }
        None => {
            let completed = is_completed.unwrap_or(true);
            let check = DayRoutineCheck {
                id: Uuid::new_v4(),
                day_routine_instance_id: instance_id,
                is_completed: completed,
                completed_at: completed.then_some(now),
            };
            data.checks.insert(instance_id, check.clone());
            check
        }
    };

    let score = calculate_daily_score(data, calendar_day_id, now)?;
    Ok(ToggleResponse { check, score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarDay, TemplateItem};
    use chrono::{NaiveDate, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn seed_day(data: &mut AppData, user: &str) -> Uuid {
        let id = Uuid::new_v4();
        data.calendar_days.insert(
            id,
            CalendarDay {
                id,
                user_id: user.to_string(),
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                template_id: None,
                created_at: at(6),
            },
        );
        id
    }

    fn seed_item(data: &mut AppData, weight: f64) -> Uuid {
        let id = Uuid::new_v4();
        data.template_items.insert(
            id,
            TemplateItem {
                id,
                template_id: Uuid::nil(),
                title: "Stretch".into(),
                description: String::new(),
                category: "Health".into(),
                default_weight: weight,
                recommended_time: None,
                custom_start_time: None,
                custom_end_time: None,
                order_index: 0,
            },
        );
        id
    }

    fn seed_instance(
        data: &mut AppData,
        day: Uuid,
        item: Uuid,
        weight: Option<f64>,
        order: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        data.instances.insert(
            id,
            DayRoutineInstance {
                id,
                calendar_day_id: day,
                routine_item_id: item,
                custom_title: None,
                custom_weight: weight,
                custom_recommended_time: None,
                custom_start_time: None,
                custom_end_time: None,
                order_index: order,
            },
        );
        id
    }

    #[test]
    fn weighted_score_counts_completed_instances() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        let item = seed_item(&mut data, 1.0);
        let a = seed_instance(&mut data, day, item, Some(1.0), 0);
        let _b = seed_instance(&mut data, day, item, Some(1.5), 1);
        let c = seed_instance(&mut data, day, item, Some(0.5), 2);

        toggle_check(&mut data, "u1", a, Some(true), at(7)).unwrap();
        let outcome = toggle_check(&mut data, "u1", c, Some(true), at(8)).unwrap();

        assert_eq!(outcome.score.total_possible_score, 3.0);
        assert_eq!(outcome.score.achieved_score, 1.5);
        assert_eq!(outcome.score.discipline_rating, 50);
        assert_eq!(outcome.score.focus_rating, 0);
    }

    #[test]
    fn empty_day_scores_zero() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");

        let score = calculate_daily_score(&mut data, day, at(9)).unwrap();
        assert_eq!(score.total_possible_score, 0.0);
        assert_eq!(score.achieved_score, 0.0);
        assert_eq!(score.discipline_rating, 0);
        assert_eq!(score.user_id, "u1");
    }

    #[test]
    fn missing_day_is_reported() {
        let mut data = AppData::default();
        let err = calculate_daily_score(&mut data, Uuid::new_v4(), at(9)).unwrap_err();
        assert_eq!(err, RoutineError::DayNotFound);
    }

    #[test]
    fn template_weight_is_read_live_when_instance_has_none() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        let item = seed_item(&mut data, 2.0);
        let instance = seed_instance(&mut data, day, item, None, 0);
        let orphan = seed_instance(&mut data, day, Uuid::new_v4(), None, 1);

        assert_eq!(effective_weight(&data, &data.instances[&instance]), 2.0);
        assert_eq!(effective_weight(&data, &data.instances[&orphan]), 1.0);

        data.template_items.get_mut(&item).unwrap().default_weight = 3.0;
        let score = calculate_daily_score(&mut data, day, at(9)).unwrap();
        assert_eq!(score.total_possible_score, 4.0);
        assert_eq!(data.template_items[&item].default_weight, 3.0);
    }

    #[test]
    fn recalculation_is_idempotent_and_keeps_identity() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        let item = seed_item(&mut data, 1.0);
        let instance = seed_instance(&mut data, day, item, None, 0);
        toggle_check(&mut data, "u1", instance, None, at(7)).unwrap();

        let first = calculate_daily_score(&mut data, day, at(10)).unwrap();
        let second = calculate_daily_score(&mut data, day, at(11)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.total_possible_score.to_bits(), second.total_possible_score.to_bits());
        assert_eq!(first.achieved_score.to_bits(), second.achieved_score.to_bits());
        assert_eq!(first.discipline_rating, second.discipline_rating);
        assert_eq!(second.calculated_at, at(11));
        assert_eq!(data.scores.len(), 1);
    }

    #[test]
    fn toggle_creates_then_flips_check() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        let item = seed_item(&mut data, 1.0);
        let instance = seed_instance(&mut data, day, item, None, 0);

        let created = toggle_check(&mut data, "u1", instance, None, at(7)).unwrap();
        assert!(created.check.is_completed);
        assert_eq!(created.check.completed_at, Some(at(7)));
        assert_eq!(created.score.discipline_rating, 100);

        let flipped = toggle_check(&mut data, "u1", instance, None, at(8)).unwrap();
        assert!(!flipped.check.is_completed);
        assert_eq!(flipped.check.completed_at, None);
        assert_eq!(flipped.check.id, created.check.id);
        assert_eq!(flipped.score.discipline_rating, 0);
        assert_eq!(data.scores[&day].discipline_rating, 0);
    }

    #[test]
    fn explicit_incomplete_on_first_toggle_leaves_no_timestamp() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        let item = seed_item(&mut data, 1.0);
        let instance = seed_instance(&mut data, day, item, None, 0);

        let outcome = toggle_check(&mut data, "u1", instance, Some(false), at(7)).unwrap();
        assert!(!outcome.check.is_completed);
        assert_eq!(outcome.check.completed_at, None);
    }

    #[test]
    fn toggle_by_other_user_is_forbidden_and_writes_nothing() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "alice");
        let item = seed_item(&mut data, 1.0);
        let instance = seed_instance(&mut data, day, item, None, 0);

        let err = toggle_check(&mut data, "bob", instance, Some(true), at(7)).unwrap_err();
        assert_eq!(err, RoutineError::Forbidden);
        assert!(data.checks.is_empty());
        assert!(data.scores.is_empty());
    }

    #[test]
    fn calculate_for_user_checks_owner() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "alice");

        let err = calculate_for_user(&mut data, "bob", day, at(7)).unwrap_err();
        assert_eq!(err, RoutineError::Forbidden);
        assert!(calculate_for_user(&mut data, "alice", day, at(7)).is_ok());
    }

    #[test]
    fn refresh_only_touches_existing_snapshots() {
        let mut data = AppData::default();
        let day = seed_day(&mut data, "u1");
        assert_eq!(refresh_existing_score(&mut data, day, at(7)).unwrap(), None);
        assert!(data.scores.is_empty());

        calculate_daily_score(&mut data, day, at(7)).unwrap();
        let refreshed = refresh_existing_score(&mut data, day, at(8)).unwrap();
        assert_eq!(refreshed.map(|score| score.calculated_at), Some(at(8)));
    }

    #[test]
    fn rating_rounds_half_up() {
        assert_eq!(discipline_rating(1.0, 3.0), 33);
        assert_eq!(discipline_rating(2.0, 3.0), 67);
        assert_eq!(discipline_rating(0.5, 0.0), 50);
        assert_eq!(discipline_rating(1.0, 8.0), 13);
    }
}
