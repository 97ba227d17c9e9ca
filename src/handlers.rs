use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::generation::{generate_routine, GeneratedRoutine, Intake};
use crate::instantiator;
use crate::models::{
    ActivateTemplateRequest, AddInstanceRequest, CalculateScoreRequest, CleanupResponse,
    CreateManualTemplateRequest, CreateTemplateRequest, DailyScore, DateQuery,
    DayRoutineInstance, DeleteTemplateResponse, EnsureDayRequest, EnsureDayResponse,
    InstancePatch, MonthQuery, MonthResponse, RoutineTemplate, TemplateWithItems,
    ToggleCheckRequest, ToggleResponse, TodayResponse, WeeklyStatsResponse,
};
use crate::scoring;
use crate::state::AppState;
use crate::stats::{build_month, build_weekly_stats};
use crate::templates;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;
use uuid::Uuid;

pub async fn list_templates(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<RoutineTemplate>>, AppError> {
    let templates = state
        .read(|data| Ok(templates::list_templates(data, &user_id)))
        .await?;
    Ok(Json(templates))
}

pub async fn get_template(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(template_id): Path<Uuid>,
) -> Result<Json<TemplateWithItems>, AppError> {
    let template = state
        .read(|data| templates::get_template(data, &user_id, template_id))
        .await?;
    Ok(Json(template))
}

pub async fn create_template(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<Json<RoutineTemplate>, AppError> {
    let template = state
        .transaction(|data| Ok(templates::create_template(data, &user_id, payload, Utc::now())))
        .await?;
    Ok(Json(template))
}

pub async fn create_manual_template(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CreateManualTemplateRequest>,
) -> Result<Json<TemplateWithItems>, AppError> {
    let template = state
        .transaction(|data| templates::create_manual_template(data, &user_id, payload, Utc::now()))
        .await?;
    info!(%user_id, template_id = %template.template.id, "created manual template");
    Ok(Json(template))
}

pub async fn activate_template(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ActivateTemplateRequest>,
) -> Result<Json<RoutineTemplate>, AppError> {
    let template = state
        .transaction(|data| templates::activate_template(data, &user_id, payload.template_id))
        .await?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(template_id): Path<Uuid>,
) -> Result<Json<DeleteTemplateResponse>, AppError> {
    state
        .transaction(|data| templates::delete_template(data, &user_id, template_id, Utc::now()))
        .await?;
    Ok(Json(DeleteTemplateResponse { success: true }))
}

#[derive(Debug, Serialize)]
pub struct OnboardResponse {
    pub template: TemplateWithItems,
    pub routine: GeneratedRoutine,
}

pub async fn onboard(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(intake): Json<Intake>,
) -> Result<Json<OnboardResponse>, AppError> {
    let routine = generate_routine(state.generator.as_ref(), &intake);
    let template = state
        .transaction(|data| {
            Ok(templates::install_generated_template(
                data,
                &user_id,
                &routine,
                Utc::now(),
            ))
        })
        .await?;
    info!(%user_id, template_id = %template.template.id, items = template.items.len(), "onboarded");
    Ok(Json(OnboardResponse { template, routine }))
}

pub async fn get_today(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<TodayResponse>, AppError> {
    let date = query.date.unwrap_or_else(today);
    let view = state
        .read(|data| Ok(instantiator::today_view(data, &user_id, date)))
        .await?;
    Ok(Json(view))
}

pub async fn ensure_day(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    body: Bytes,
) -> Result<Json<EnsureDayResponse>, AppError> {
    let request: EnsureDayRequest = optional_json(&body)?;
    let date = request.date.unwrap_or_else(today);
    let outcome = state
        .transaction(|data| {
            instantiator::ensure_day_instances(
                data,
                &user_id,
                date,
                request.force_recreate,
                Utc::now(),
            )
        })
        .await?;
    info!(
        %user_id,
        %date,
        force_recreate = request.force_recreate,
        instances = outcome.calendar_day.instances.len(),
        "ensured calendar day"
    );
    Ok(Json(outcome))
}

pub async fn cleanup_day(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    body: Bytes,
) -> Result<Json<CleanupResponse>, AppError> {
    let request: DateQuery = optional_json(&body)?;
    let date = request.date.unwrap_or_else(today);
    let removed = state
        .transaction(|data| instantiator::cleanup_orphans(data, &user_id, date, Utc::now()))
        .await?;
    if removed > 0 {
        info!(%user_id, %date, removed, "cleared orphaned instances");
    }
    Ok(Json(CleanupResponse { removed }))
}

pub async fn get_month(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthResponse>, AppError> {
    let month = state
        .read(|data| build_month(data, &user_id, query.year, query.month))
        .await?;
    Ok(Json(month))
}

pub async fn add_instance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<AddInstanceRequest>,
) -> Result<Json<DayRoutineInstance>, AppError> {
    let instance = state
        .transaction(|data| instantiator::add_ad_hoc_instance(data, &user_id, payload, Utc::now()))
        .await?;
    Ok(Json(instance))
}

pub async fn patch_instance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(instance_id): Path<Uuid>,
    Json(patch): Json<InstancePatch>,
) -> Result<Json<DayRoutineInstance>, AppError> {
    let instance = state
        .transaction(|data| {
            instantiator::patch_instance(data, &user_id, instance_id, patch, Utc::now())
        })
        .await?;
    Ok(Json(instance))
}

pub async fn delete_instance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(instance_id): Path<Uuid>,
) -> Result<Json<DayRoutineInstance>, AppError> {
    let instance = state
        .transaction(|data| instantiator::delete_instance(data, &user_id, instance_id, Utc::now()))
        .await?;
    Ok(Json(instance))
}

pub async fn toggle_check(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ToggleCheckRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let outcome = state
        .transaction(|data| {
            scoring::toggle_check(
                data,
                &user_id,
                payload.day_routine_instance_id,
                payload.is_completed,
                Utc::now(),
            )
        })
        .await?;
    Ok(Json(outcome))
}

pub async fn calculate_score(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CalculateScoreRequest>,
) -> Result<Json<DailyScore>, AppError> {
    let score = state
        .transaction(|data| {
            scoring::calculate_for_user(data, &user_id, payload.calendar_day_id, Utc::now())
        })
        .await?;
    Ok(Json(score))
}

pub async fn get_weekly_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<WeeklyStatsResponse>, AppError> {
    let stats = state
        .read(|data| Ok(build_weekly_stats(data, &user_id)))
        .await?;
    Ok(Json(stats))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses a JSON body that may be left out entirely. A blank body yields the
/// defaults; anything else must parse.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("invalid request body: {err}")))
}
