//! Routine generation from the onboarding questionnaire.
//!
//! An upstream generator plugs in behind [`RoutineGenerator`]. Whatever it
//! returns, or the deterministic fallback when it fails, goes through
//! [`normalize_routine`] before it reaches the template store.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const MORNING_START: u32 = 6 * 60;
const DAY_START: u32 = 9 * 60;
const EVENING_START: u32 = 20 * 60;
const BUFFER_MINUTES: u32 = 5;
const DEFAULT_DURATION: u32 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Intake {
    pub primary_focus: Option<String>,
    /// Comma separated.
    pub focus_areas: Option<String>,
    /// Comma separated.
    pub skills: Option<String>,
    pub available_time: Option<String>,
    pub best_time: Option<String>,
    pub energy_pattern: Option<String>,
    pub breakers: Option<String>,
    pub current_consistency: Option<String>,
    pub structure_kind: Option<String>,
    pub learning_pref: Option<String>,
    pub why_now: Option<String>,
    pub commitment: Option<String>,
}

impl Intake {
    fn primary_focus(&self) -> String {
        self.primary_focus
            .as_deref()
            .map(str::trim)
            .filter(|focus| !focus.is_empty())
            .unwrap_or("Personal Growth")
            .to_string()
    }

    fn focus_areas(&self) -> Vec<String> {
        split_list(self.focus_areas.as_deref())
    }

    fn topics(&self) -> Vec<String> {
        let mut topics = self.focus_areas();
        topics.extend(split_list(self.skills.as_deref()));
        topics
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub default_weight: Option<f64>,
    pub recommended_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub order_index: Option<i64>,
}

impl GeneratedItem {
    fn new(title: &str, description: &str, category: &str, weight: f64, duration: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            category: Some(category.to_string()),
            default_weight: Some(weight),
            recommended_time: Some(duration.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyRoutine {
    pub morning: Vec<GeneratedItem>,
    pub day: Vec<GeneratedItem>,
    pub evening: Vec<GeneratedItem>,
}

impl DailyRoutine {
    /// Morning, then day, then evening.
    pub fn flatten(&self) -> Vec<&GeneratedItem> {
        self.morning
            .iter()
            .chain(&self.day)
            .chain(&self.evening)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedRoutine {
    pub core_theme: Option<String>,
    pub anchor_habits: Vec<String>,
    pub daily_routine: DailyRoutine,
    pub weekly_notes: Option<String>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("routine generator is not configured")]
    Unconfigured,
    #[error("routine generator failed: {0}")]
    Upstream(String),
}

pub trait RoutineGenerator: Send + Sync {
    fn generate(&self, intake: &Intake) -> Result<GeneratedRoutine, GenerationError>;
}

/// Deterministic routine built from the intake alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl RoutineGenerator for FallbackGenerator {
    fn generate(&self, intake: &Intake) -> Result<GeneratedRoutine, GenerationError> {
        Ok(fallback_routine(intake))
    }
}

/// Runs the configured generator, degrading to the fallback routine when it
/// fails, and normalizes the result.
pub fn generate_routine(generator: &dyn RoutineGenerator, intake: &Intake) -> GeneratedRoutine {
    let routine = generator.generate(intake).unwrap_or_else(|err| {
        warn!("{err}; using fallback routine");
        fallback_routine(intake)
    });
    normalize_routine(routine, intake)
}

pub fn fallback_routine(intake: &Intake) -> GeneratedRoutine {
    let primary = intake.primary_focus();
    let areas = intake.focus_areas();

    let mut day = vec![GeneratedItem::new(
        &format!("Focus on {primary}"),
        "Deep work session",
        "Work",
        1.5,
        "45 min",
    )];
    for area in areas.iter().take(2) {
        day.push(GeneratedItem::new(
            &format!("{area} practice"),
            &format!("Develop your skills in {area}"),
            "Learning",
            1.0,
            "25 min",
        ));
    }
    day.push(GeneratedItem::new(
        "Active break",
        "Stretch or short walk",
        "Health",
        0.5,
        "15 min",
    ));

    let core_theme = if areas.is_empty() {
        format!("Building {primary}")
    } else {
        format!("Building {primary}, {}", areas.join(", "))
    };
    let mut anchor_habits = vec![primary];
    anchor_habits.extend(areas.into_iter().take(2));
    anchor_habits.extend(["Reflection".to_string(), "Rest".to_string()]);

    GeneratedRoutine {
        core_theme: Some(core_theme),
        anchor_habits,
        daily_routine: DailyRoutine {
            morning: vec![
                GeneratedItem::new(
                    "Morning reflection",
                    "Start your day with intention",
                    "Planning",
                    1.0,
                    "10 min",
                ),
                GeneratedItem::new(
                    "Gentle planning",
                    "Pick one priority for today",
                    "Planning",
                    1.0,
                    "10 min",
                ),
            ],
            day,
            evening: vec![
                GeneratedItem::new(
                    "Evening reflection",
                    "Review and rest",
                    "Reflection",
                    1.0,
                    "15 min",
                ),
                GeneratedItem::new(
                    "Light unwind",
                    "Screen-free wind down",
                    "Rest",
                    0.5,
                    "20 min",
                ),
            ],
        },
        weekly_notes: Some("Start small. Build rhythm. Adjust as you grow.".to_string()),
    }
}

/// Splits combined titles, tops sections up to their minimum size and lays
/// the items out back to back from each section's start time.
pub fn normalize_routine(mut routine: GeneratedRoutine, intake: &Intake) -> GeneratedRoutine {
    let morning_defaults = vec![
        GeneratedItem::new("Gentle planning", "Set one clear intention", "Planning", 1.0, "10 min"),
        GeneratedItem::new("Breathing reset", "2–3 minutes to settle", "Health", 0.5, "5 min"),
    ];
    let day_defaults = intake
        .topics()
        .into_iter()
        .take(3)
        .map(|topic| GeneratedItem::new(&topic, &format!("Practice {topic}"), "Work", 1.5, "30 min"))
        .collect();
    let evening_defaults = vec![
        GeneratedItem::new(
            "Evening reflection",
            "Note one win and one lesson",
            "Reflection",
            1.0,
            "15 min",
        ),
        GeneratedItem::new("Light unwind", "Screen-free wind down", "Rest", 0.5, "20 min"),
    ];

    let sections = std::mem::take(&mut routine.daily_routine);
    routine.daily_routine = DailyRoutine {
        morning: schedule(top_up(split_combined(sections.morning), 2, morning_defaults), MORNING_START),
        day: schedule(top_up(split_combined(sections.day), 3, day_defaults), DAY_START),
        evening: schedule(
            top_up(split_combined(sections.evening), 2, evening_defaults),
            EVENING_START,
        ),
    };
    routine
}

fn split_combined(items: Vec<GeneratedItem>) -> Vec<GeneratedItem> {
    let mut expanded = Vec::with_capacity(items.len());
    for item in items {
        let parts = item
            .title
            .as_deref()
            .filter(|title| title.contains(','))
            .map(|title| split_list(Some(title)));
        match parts {
            Some(parts) => {
                for part in parts {
                    expanded.push(GeneratedItem {
                        title: Some(part),
                        ..item.clone()
                    });
                }
            }
            None => expanded.push(item),
        }
    }
    expanded
}

fn top_up(mut items: Vec<GeneratedItem>, target: usize, defaults: Vec<GeneratedItem>) -> Vec<GeneratedItem> {
    let missing = target.saturating_sub(items.len());
    items.extend(defaults.into_iter().take(missing));
    items
}

fn schedule(items: Vec<GeneratedItem>, start: u32) -> Vec<GeneratedItem> {
    let mut clock = start;
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let duration = parse_duration(item.recommended_time.as_deref().unwrap_or_default());
            let scheduled = GeneratedItem {
                start_time: Some(minutes_to_time(clock)),
                end_time: Some(minutes_to_time(clock + duration)),
                order_index: Some(index as i64),
                ..item
            };
            clock += duration + BUFFER_MINUTES;
            scheduled
        })
        .collect()
}

/// Reads the first "<n> min", "<n> hour" or "<n>h" in a duration label.
pub fn parse_duration(label: &str) -> u32 {
    let bytes = label.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if !bytes[index].is_ascii_digit() {
            index += 1;
            continue;
        }
        let digits_start = index;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }
        let digits = &label[digits_start..index];
        let unit = label[index..].trim_start();
        let Ok(amount) = digits.parse::<u32>() else {
            continue;
        };
        if unit.starts_with("min") {
            return amount;
        }
        if unit.starts_with('h') {
            return amount.saturating_mul(60);
        }
    }
    DEFAULT_DURATION
}

pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}
