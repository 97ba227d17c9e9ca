//! Materialises per-day checklists from a user's active template.
//!
//! Existing instances are reconciled rather than replaced: user edits survive
//! re-instantiation, and only never-set start/end times pick up template
//! changes.

use crate::errors::RoutineError;
use crate::models::{
    AddInstanceRequest, AppData, CalendarDay, DayRoutineInstance, DayStatus, EnsureDayResponse,
    InstancePatch, TemplateItem, TodayResponse,
};
use crate::scoring::refresh_existing_score;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

pub fn ensure_day_instances(
    data: &mut AppData,
    user_id: &str,
    date: NaiveDate,
    force_recreate: bool,
    now: DateTime<Utc>,
) -> Result<EnsureDayResponse, RoutineError> {
    let template_id = data
        .active_template(user_id)
        .map(|template| template.id)
        .ok_or(RoutineError::NoActiveTemplate)?;

    let day_id = match data.find_day(user_id, date).map(|day| day.id) {
        Some(day_id) => {
            if force_recreate {
                let stale: Vec<Uuid> = data.instances_of(day_id).iter().map(|i| i.id).collect();
                for instance_id in stale {
                    data.remove_instance(instance_id);
                }
            }
            if let Some(day) = data.calendar_days.get_mut(&day_id) {
                if day.template_id.is_none() {
                    day.template_id = Some(template_id);
                }
            }
            day_id
        }
        None => {
            let day = CalendarDay {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                date,
                template_id: Some(template_id),
                created_at: now,
            };
            let day_id = day.id;
            data.calendar_days.insert(day_id, day);
            day_id
        }
    };

    let items: Vec<TemplateItem> = data.items_of(template_id).into_iter().cloned().collect();
    let mut instances = Vec::with_capacity(items.len());
    let (mut created, mut reconciled) = (0usize, 0usize);

    for item in &items {
        let existing = data
            .instances
            .values_mut()
            .filter(|instance| instance.calendar_day_id == day_id && instance.routine_item_id == item.id)
            .min_by_key(|instance| (instance.order_index, instance.id));

        match existing {
            Some(instance) => {
                if backfill_times(instance, item) {
                    reconciled += 1;
                }
                instances.push(instance.clone());
            }
            None => {
                let instance = instance_from_item(day_id, item);
                data.instances.insert(instance.id, instance.clone());
                instances.push(instance);
                created += 1;
            }
        }
    }

    if force_recreate {
        refresh_existing_score(data, day_id, now)?;
    }

    debug!(%user_id, %date, created, reconciled, "ensured day instances");

    let day = data
        .calendar_days
        .get(&day_id)
        .ok_or(RoutineError::DayNotFound)?;
    Ok(EnsureDayResponse {
        calendar_day: data.day_view(day),
        instances,
    })
}

/// Fills start/end times the user never set from the template item. Returns
/// whether anything changed.
fn backfill_times(instance: &mut DayRoutineInstance, item: &TemplateItem) -> bool {
    let mut changed = false;
    if instance.custom_start_time.is_none() && item.custom_start_time.is_some() {
        instance.custom_start_time = item.custom_start_time.clone();
        changed = true;
    }
    if instance.custom_end_time.is_none() && item.custom_end_time.is_some() {
        instance.custom_end_time = item.custom_end_time.clone();
        changed = true;
    }
    changed
}

fn instance_from_item(calendar_day_id: Uuid, item: &TemplateItem) -> DayRoutineInstance {
    DayRoutineInstance {
        id: Uuid::new_v4(),
        calendar_day_id,
        routine_item_id: item.id,
        custom_title: Some(item.title.clone()),
        custom_weight: Some(item.default_weight),
        custom_recommended_time: item.recommended_time.clone(),
        custom_start_time: item.custom_start_time.clone(),
        custom_end_time: item.custom_end_time.clone(),
        order_index: item.order_index,
    }
}

/// Adds a one-off activity to a day. The activity is also appended to the
/// day's template so it carries into future days.
pub fn add_ad_hoc_instance(
    data: &mut AppData,
    user_id: &str,
    request: AddInstanceRequest,
    now: DateTime<Utc>,
) -> Result<DayRoutineInstance, RoutineError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(RoutineError::validation("calendar_day_id and title are required"));
    }

    let day = data
        .calendar_days
        .get(&request.calendar_day_id)
        .ok_or(RoutineError::DayNotFound)?;
    if day.user_id != user_id {
        return Err(RoutineError::Forbidden);
    }

    let template_id = match (day.template_id, request.active_template_id) {
        (Some(template_id), _) => template_id,
        (None, Some(adopted)) => {
            let template = data
                .templates
                .get(&adopted)
                .ok_or(RoutineError::TemplateNotFound)?;
            if template.user_id != user_id {
                return Err(RoutineError::Forbidden);
            }
            if let Some(day) = data.calendar_days.get_mut(&request.calendar_day_id) {
                day.template_id = Some(adopted);
            }
            adopted
        }
        (None, None) => return Err(RoutineError::NoTemplateForDay),
    };

    let weight = request
        .weight
        .filter(|weight| weight.is_finite() && *weight > 0.0)
        .unwrap_or(1.0);
    let next_item_order = next_order(
        data.items_of(template_id)
            .iter()
            .map(|item| item.order_index),
    )?;
    let next_instance_order = next_order(
        data.instances_of(request.calendar_day_id)
            .iter()
            .map(|instance| instance.order_index),
    )?;

    let item = TemplateItem {
        id: Uuid::new_v4(),
        template_id,
        title: title.to_string(),
        description: String::new(),
        category: "General".to_string(),
        default_weight: weight,
        recommended_time: None,
        custom_start_time: None,
        custom_end_time: None,
        order_index: next_item_order,
    };
    let instance = DayRoutineInstance {
        id: Uuid::new_v4(),
        calendar_day_id: request.calendar_day_id,
        routine_item_id: item.id,
        custom_title: Some(title.to_string()),
        custom_weight: Some(weight),
        custom_recommended_time: None,
        custom_start_time: non_blank(request.start_time),
        custom_end_time: non_blank(request.end_time),
        order_index: next_instance_order,
    };

    data.template_items.insert(item.id, item);
    data.instances.insert(instance.id, instance.clone());
    refresh_existing_score(data, request.calendar_day_id, now)?;
    Ok(instance)
}

/// One past the highest order index, counting from 0.
fn next_order(orders: impl Iterator<Item = i64>) -> Result<i64, RoutineError> {
    orders
        .fold(0, i64::max)
        .checked_add(1)
        .ok_or_else(|| RoutineError::validation("order_index is out of range"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Looks up an instance and verifies the caller owns its day.
fn owned_instance<'a>(
    data: &'a AppData,
    user_id: &str,
    instance_id: Uuid,
) -> Result<&'a DayRoutineInstance, RoutineError> {
    let instance = data
        .instances
        .get(&instance_id)
        .ok_or(RoutineError::InstanceNotFound)?;
    let owner = data
        .calendar_days
        .get(&instance.calendar_day_id)
        .map(|day| day.user_id.as_str());
    if owner != Some(user_id) {
        return Err(RoutineError::Forbidden);
    }
    Ok(instance)
}

pub fn patch_instance(
    data: &mut AppData,
    user_id: &str,
    instance_id: Uuid,
    patch: InstancePatch,
    now: DateTime<Utc>,
) -> Result<DayRoutineInstance, RoutineError> {
    let calendar_day_id = owned_instance(data, user_id, instance_id)?.calendar_day_id;

    if let Some(title) = &patch.custom_title {
        if title.trim().is_empty() {
            return Err(RoutineError::validation("title must not be empty"));
        }
    }
    if let Some(weight) = patch.custom_weight {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(RoutineError::validation("weight must be a positive number"));
        }
    }

    let instance = data
        .instances
        .get_mut(&instance_id)
        .ok_or(RoutineError::InstanceNotFound)?;
    if let Some(title) = patch.custom_title {
        instance.custom_title = Some(title.trim().to_string());
    }
    if let Some(weight) = patch.custom_weight {
        instance.custom_weight = Some(weight);
    }
    if let Some(start) = patch.custom_start_time {
        instance.custom_start_time = start;
    }
    if let Some(end) = patch.custom_end_time {
        instance.custom_end_time = end;
    }
    let updated = instance.clone();

    refresh_existing_score(data, calendar_day_id, now)?;
    Ok(updated)
}

pub fn delete_instance(
    data: &mut AppData,
    user_id: &str,
    instance_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DayRoutineInstance, RoutineError> {
    owned_instance(data, user_id, instance_id)?;
    let deleted = data
        .remove_instance(instance_id)
        .ok_or(RoutineError::InstanceNotFound)?;
    refresh_existing_score(data, deleted.calendar_day_id, now)?;
    Ok(deleted)
}

pub fn day_status(data: &AppData, user_id: &str, date: NaiveDate) -> DayStatus {
    let Some(day) = data.find_day(user_id, date) else {
        return DayStatus::NotStarted;
    };
    let has_instances = !data.instances_of(day.id).is_empty();

    match data.active_template(user_id) {
        None if has_instances => DayStatus::Orphaned,
        _ if !has_instances => DayStatus::Empty,
        Some(active) if day.template_id == Some(active.id) => DayStatus::InSync,
        _ => DayStatus::Diverged,
    }
}

pub fn today_view(data: &AppData, user_id: &str, date: NaiveDate) -> TodayResponse {
    let day = data.find_day(user_id, date).map(|day| data.day_view(day));
    TodayResponse {
        found: day.is_some(),
        status: day_status(data, user_id, date),
        day,
    }
}

/// Clears a day whose instances outlived every template the user had, so the
/// user can onboard again. Returns how many instances were removed.
pub fn cleanup_orphans(
    data: &mut AppData,
    user_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, RoutineError> {
    if day_status(data, user_id, date) != DayStatus::Orphaned {
        return Ok(0);
    }
    let Some(day_id) = data.find_day(user_id, date).map(|day| day.id) else {
        return Ok(0);
    };

    let orphaned: Vec<Uuid> = data.instances_of(day_id).iter().map(|i| i.id).collect();
    for instance_id in &orphaned {
        data.remove_instance(*instance_id);
    }
    refresh_existing_score(data, day_id, now)?;
    Ok(orphaned.len())
}
