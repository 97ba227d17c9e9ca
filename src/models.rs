use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineTemplate {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub period_type: String,
    pub created_by_ai: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub default_weight: f64,
    pub recommended_time: Option<String>,
    pub custom_start_time: Option<String>,
    pub custom_end_time: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    /// Template that was active when the day was created.
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRoutineInstance {
    pub id: Uuid,
    pub calendar_day_id: Uuid,
    pub routine_item_id: Uuid,
    pub custom_title: Option<String>,
    pub custom_weight: Option<f64>,
    pub custom_recommended_time: Option<String>,
    pub custom_start_time: Option<String>,
    pub custom_end_time: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRoutineCheck {
    pub id: Uuid,
    pub day_routine_instance_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyScore {
    pub id: Uuid,
    pub calendar_day_id: Uuid,
    pub user_id: String,
    pub total_possible_score: f64,
    pub achieved_score: f64,
    pub discipline_rating: u32,
    pub focus_rating: u32,
    pub calculated_at: DateTime<Utc>,
}

/// The whole persisted store. Checks are keyed by instance id and scores by
/// calendar day id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub templates: BTreeMap<Uuid, RoutineTemplate>,
    #[serde(default)]
    pub template_items: BTreeMap<Uuid, TemplateItem>,
    #[serde(default)]
    pub calendar_days: BTreeMap<Uuid, CalendarDay>,
    #[serde(default)]
    pub instances: BTreeMap<Uuid, DayRoutineInstance>,
    #[serde(default)]
    pub checks: BTreeMap<Uuid, DayRoutineCheck>,
    #[serde(default)]
    pub scores: BTreeMap<Uuid, DailyScore>,
}

impl AppData {
    pub fn active_template(&self, user_id: &str) -> Option<&RoutineTemplate> {
        self.templates
            .values()
            .find(|template| template.user_id == user_id && template.is_active)
    }

    pub fn find_day(&self, user_id: &str, date: NaiveDate) -> Option<&CalendarDay> {
        self.calendar_days
            .values()
            .find(|day| day.user_id == user_id && day.date == date)
    }

    /// Items of a template in `order_index` order.
    pub fn items_of(&self, template_id: Uuid) -> Vec<&TemplateItem> {
        let mut items: Vec<_> = self
            .template_items
            .values()
            .filter(|item| item.template_id == template_id)
            .collect();
        items.sort_by_key(|item| (item.order_index, item.id));
        items
    }

    /// Instances of a day in `order_index` order.
    pub fn instances_of(&self, calendar_day_id: Uuid) -> Vec<&DayRoutineInstance> {
        let mut instances: Vec<_> = self
            .instances
            .values()
            .filter(|instance| instance.calendar_day_id == calendar_day_id)
            .collect();
        instances.sort_by_key(|instance| (instance.order_index, instance.id));
        instances
    }

    /// Removes an instance together with its check.
    pub fn remove_instance(&mut self, instance_id: Uuid) -> Option<DayRoutineInstance> {
        self.checks.remove(&instance_id);
        self.instances.remove(&instance_id)
    }

    pub fn day_view(&self, day: &CalendarDay) -> DayView {
        let instances = self
            .instances_of(day.id)
            .into_iter()
            .map(|instance| InstanceView {
                instance: instance.clone(),
                check: self.checks.get(&instance.id).cloned(),
            })
            .collect();

        DayView {
            calendar_day: day.clone(),
            instances,
            daily_score: self.scores.get(&day.id).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub instance: DayRoutineInstance,
    pub check: Option<DayRoutineCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayView {
    #[serde(flatten)]
    pub calendar_day: CalendarDay,
    pub instances: Vec<InstanceView>,
    pub daily_score: Option<DailyScore>,
}

#[derive(Debug, Serialize)]
pub struct TemplateWithItems {
    #[serde(flatten)]
    pub template: RoutineTemplate,
    pub items: Vec<TemplateItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    NotStarted,
    Empty,
    InSync,
    Diverged,
    Orphaned,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub found: bool,
    pub status: DayStatus,
    pub day: Option<DayView>,
}

#[derive(Debug, Serialize)]
pub struct EnsureDayResponse {
    pub calendar_day: DayView,
    pub instances: Vec<DayRoutineInstance>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub check: DayRoutineCheck,
    pub score: DailyScore,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: Option<String>,
    pub period_type: Option<String>,
    #[serde(default)]
    pub created_by_ai: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualItemInput {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub default_weight: Option<f64>,
    pub recommended_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub order_index: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateManualTemplateRequest {
    pub title: String,
    #[serde(default)]
    pub items: Vec<ManualItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateTemplateRequest {
    pub template_id: Uuid,
}

#[derive(Debug, Deserialize, Default)]
pub struct EnsureDayRequest {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub force_recreate: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddInstanceRequest {
    pub calendar_day_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub weight: Option<f64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub active_template_id: Option<Uuid>,
}

/// Partial update of an instance. For the time fields `None` means "not
/// provided" and `Some(None)` clears the field.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstancePatch {
    pub custom_title: Option<String>,
    pub custom_weight: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub custom_start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub custom_end_time: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ToggleCheckRequest {
    pub day_routine_instance_id: Uuid,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CalculateScoreRequest {
    pub calendar_day_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteTemplateResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct MonthResponse {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayView>,
}

#[derive(Debug, Serialize)]
pub struct WeekPoint {
    pub week_num: u8,
    pub week_start: String,
    pub week_end: String,
    pub days_with_routines: usize,
    pub total_instances: usize,
    pub completed_instances: usize,
    pub completion_percent: u32,
    pub average_discipline: u32,
}

#[derive(Debug, Serialize)]
pub struct OverallPoint {
    pub days_with_routines: usize,
    pub completion_percent: u32,
    pub average_discipline: u32,
}

#[derive(Debug, Serialize)]
pub struct WeeklyStatsResponse {
    pub weeks: Vec<WeekPoint>,
    pub overall: OverallPoint,
}
