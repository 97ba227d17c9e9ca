use crate::errors::RoutineError;
use crate::generation::{GeneratedItem, GeneratedRoutine};
use crate::models::{
    AppData, CreateManualTemplateRequest, CreateTemplateRequest, RoutineTemplate, TemplateItem,
    TemplateWithItems,
};
use crate::scoring::refresh_existing_score;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

const LIST_LIMIT: usize = 50;

pub fn list_templates(data: &AppData, user_id: &str) -> Vec<RoutineTemplate> {
    let mut templates: Vec<_> = data
        .templates
        .values()
        .filter(|template| template.user_id == user_id)
        .cloned()
        .collect();
    templates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    templates.truncate(LIST_LIMIT);
    templates
}

fn owned_template<'a>(
    data: &'a AppData,
    user_id: &str,
    template_id: Uuid,
) -> Result<&'a RoutineTemplate, RoutineError> {
    let template = data
        .templates
        .get(&template_id)
        .ok_or(RoutineError::TemplateNotFound)?;
    if template.user_id != user_id {
        return Err(RoutineError::Forbidden);
    }
    Ok(template)
}

pub fn get_template(
    data: &AppData,
    user_id: &str,
    template_id: Uuid,
) -> Result<TemplateWithItems, RoutineError> {
    let template = owned_template(data, user_id, template_id)?;
    Ok(with_items(data, template))
}

fn with_items(data: &AppData, template: &RoutineTemplate) -> TemplateWithItems {
    TemplateWithItems {
        template: template.clone(),
        items: data.items_of(template.id).into_iter().cloned().collect(),
    }
}

fn new_template(user_id: &str, title: String, created_by_ai: bool, now: DateTime<Utc>) -> RoutineTemplate {
    RoutineTemplate {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        title,
        period_type: "daily".to_string(),
        created_by_ai,
        is_active: false,
        created_at: now,
    }
}

pub fn create_template(
    data: &mut AppData,
    user_id: &str,
    request: CreateTemplateRequest,
    now: DateTime<Utc>,
) -> RoutineTemplate {
    let title = request
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let mut template = new_template(user_id, title, request.created_by_ai, now);
    if let Some(period_type) = request.period_type.filter(|p| !p.trim().is_empty()) {
        template.period_type = period_type;
    }
    data.templates.insert(template.id, template.clone());
    template
}

fn positive_weight(weight: Option<f64>) -> f64 {
    weight
        .filter(|weight| weight.is_finite() && *weight > 0.0)
        .unwrap_or(1.0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub fn create_manual_template(
    data: &mut AppData,
    user_id: &str,
    request: CreateManualTemplateRequest,
    now: DateTime<Utc>,
) -> Result<TemplateWithItems, RoutineError> {
    let title = request.title.trim();
    if title.is_empty() || request.items.is_empty() {
        return Err(RoutineError::validation("Title and at least one item required"));
    }
    if request.items.iter().any(|item| item.title.trim().is_empty()) {
        return Err(RoutineError::validation("Every item needs a title"));
    }

    let template = new_template(user_id, title.to_string(), false, now);
    for (position, input) in request.items.into_iter().enumerate() {
        let item = TemplateItem {
            id: Uuid::new_v4(),
            template_id: template.id,
            title: input.title.trim().to_string(),
            description: input.description.unwrap_or_default(),
            category: non_blank(input.category).unwrap_or_else(|| "General".to_string()),
            default_weight: positive_weight(input.default_weight),
            recommended_time: Some(input.recommended_time.unwrap_or_default()),
            custom_start_time: non_blank(input.start_time),
            custom_end_time: non_blank(input.end_time),
            order_index: input.order_index.unwrap_or(position as i64),
        };
        data.template_items.insert(item.id, item);
    }
    data.templates.insert(template.id, template.clone());

    Ok(with_items(data, &template))
}

fn deactivate_all(data: &mut AppData, user_id: &str) {
    for template in data.templates.values_mut() {
        if template.user_id == user_id {
            template.is_active = false;
        }
    }
}

/// Makes `template_id` the caller's only active template.
pub fn activate_template(
    data: &mut AppData,
    user_id: &str,
    template_id: Uuid,
) -> Result<RoutineTemplate, RoutineError> {
    owned_template(data, user_id, template_id)?;
    deactivate_all(data, user_id);

    let template = data
        .templates
        .get_mut(&template_id)
        .ok_or(RoutineError::TemplateNotFound)?;
    template.is_active = true;
    info!(%user_id, %template_id, "activated template");
    Ok(template.clone())
}

/// Removes a template and everything derived from it: scores, checks and
/// instances of the days created against it, those days, its items, and any
/// instance elsewhere that still points at one of its items.
pub fn delete_template(
    data: &mut AppData,
    user_id: &str,
    template_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), RoutineError> {
    owned_template(data, user_id, template_id)?;

    let days: BTreeSet<Uuid> = data
        .calendar_days
        .values()
        .filter(|day| day.template_id == Some(template_id))
        .map(|day| day.id)
        .collect();
    let items: BTreeSet<Uuid> = data
        .template_items
        .values()
        .filter(|item| item.template_id == template_id)
        .map(|item| item.id)
        .collect();

    let mut touched_days = BTreeSet::new();
    let doomed: Vec<Uuid> = data
        .instances
        .values()
        .filter(|instance| {
            days.contains(&instance.calendar_day_id) || items.contains(&instance.routine_item_id)
        })
        .map(|instance| {
            touched_days.insert(instance.calendar_day_id);
            instance.id
        })
        .collect();

    for day_id in &days {
        data.scores.remove(day_id);
    }
    for instance_id in &doomed {
        data.remove_instance(*instance_id);
    }
    for day_id in &days {
        data.calendar_days.remove(day_id);
    }
    for item_id in &items {
        data.template_items.remove(item_id);
    }
    data.templates.remove(&template_id);

    for day_id in touched_days.difference(&days) {
        refresh_existing_score(data, *day_id, now)?;
    }

    info!(
        %user_id,
        %template_id,
        days = days.len(),
        instances = doomed.len(),
        items = items.len(),
        "deleted template"
    );
    Ok(())
}

/// Stores a generated routine as the caller's new active template.
pub fn install_generated_template(
    data: &mut AppData,
    user_id: &str,
    routine: &GeneratedRoutine,
    now: DateTime<Utc>,
) -> TemplateWithItems {
    deactivate_all(data, user_id);

    let title = routine
        .core_theme
        .clone()
        .filter(|theme| !theme.trim().is_empty())
        .unwrap_or_else(|| "AI Generated Routine".to_string());
    let mut template = new_template(user_id, title, true, now);
    template.is_active = true;

    for (position, generated) in routine.daily_routine.flatten().into_iter().enumerate() {
        let item = generated_item(template.id, position, generated);
        data.template_items.insert(item.id, item);
    }
    data.templates.insert(template.id, template.clone());

    with_items(data, &template)
}

fn generated_item(template_id: Uuid, position: usize, generated: &GeneratedItem) -> TemplateItem {
    TemplateItem {
        id: Uuid::new_v4(),
        template_id,
        title: non_blank(generated.title.clone()).unwrap_or_else(|| format!("Item {}", position + 1)),
        description: generated.description.clone().unwrap_or_default(),
        category: non_blank(generated.category.clone())
            .unwrap_or_else(|| "Uncategorized".to_string()),
        default_weight: positive_weight(generated.default_weight),
        recommended_time: non_blank(generated.recommended_time.clone()),
        custom_start_time: non_blank(generated.start_time.clone()),
        custom_end_time: non_blank(generated.end_time.clone()),
        order_index: position as i64,
    }
}
