//! Core types for daybook
//!
//! Everything one chat turn may carry: sleep, exercise sessions, wellness,
//! tasks, reading links and a free-form journal note. All fields are
//! optional because a message might mention only one category, or only a
//! fragment of one. The same [`Entities`] shape is used for a single turn's
//! extraction candidate and for the accumulated state of a multi-turn
//! clarification.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A flat key/value record with a `type` discriminator tag.
///
/// This is the only shape that crosses the persistence boundary: no nested
/// rich objects, dates as ISO-8601 strings.
pub type FlatRecord = serde_json::Map<String, serde_json::Value>;

/// Record type tags used in the store and the `type` field of flat records.
pub const RECORD_SLEEP: &str = "sleep";
pub const RECORD_EXERCISE: &str = "exercise";
pub const RECORD_WELLNESS: &str = "wellness";
pub const RECORD_TASK: &str = "task";
pub const RECORD_READING_LINK: &str = "reading_link";
pub const RECORD_JOURNAL: &str = "journal";

/// Maximum length of an exercise note
pub const MAX_EXERCISE_NOTE_CHARS: usize = 500;
/// Maximum length of a wellness note
pub const MAX_WELLNESS_NOTE_CHARS: usize = 1000;
/// Exercise session duration bounds (minutes)
pub const MAX_EXERCISE_MINUTES: u32 = 600;

/// Subjective sleep quality rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SleepQuality::Poor => write!(f, "poor"),
            SleepQuality::Fair => write!(f, "fair"),
            SleepQuality::Good => write!(f, "good"),
            SleepQuality::Excellent => write!(f, "excellent"),
        }
    }
}

impl std::str::FromStr for SleepQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poor" => Ok(SleepQuality::Poor),
            "fair" => Ok(SleepQuality::Fair),
            "good" => Ok(SleepQuality::Good),
            "excellent" => Ok(SleepQuality::Excellent),
            _ => Err(format!("Unknown sleep quality: {}", s)),
        }
    }
}

/// A single night of sleep data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
    /// Calendar date the night belongs to
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Hour went to sleep (0-23)
    #[serde(default)]
    pub bedtime_hour: Option<u8>,
    #[serde(default)]
    pub bedtime_minute: Option<u8>,
    /// Hour woke up (0-23)
    #[serde(default)]
    pub wake_hour: Option<u8>,
    #[serde(default)]
    pub wake_minute: Option<u8>,
    /// Total sleep duration in decimal hours, if times are not given
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub quality: Option<SleepQuality>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SleepEntry {
    /// Fill `duration_hours` from bed/wake times when both are present.
    ///
    /// Wake times at or before bedtime are treated as crossing midnight, so
    /// the derived duration is always positive. An explicitly provided
    /// duration is never overwritten.
    pub fn derive_duration(&mut self) {
        if let (Some(bed_h), Some(wake_h)) = (self.bedtime_hour, self.wake_hour) {
            let bed_total = i32::from(bed_h) * 60 + i32::from(self.bedtime_minute.unwrap_or(0));
            let mut wake_total =
                i32::from(wake_h) * 60 + i32::from(self.wake_minute.unwrap_or(0));
            if wake_total <= bed_total {
                wake_total += 24 * 60;
            }
            if self.duration_hours.is_none() {
                let hours = f64::from(wake_total - bed_total) / 60.0;
                self.duration_hours = Some((hours * 100.0).round() / 100.0);
            }
        }
    }

    /// Drop fields that cannot be right, without failing the turn.
    ///
    /// A bedtime between 09:00 and 17:00 is almost certainly an extraction
    /// error (the model read a daytime nap or a wake time as a bedtime).
    pub fn sanitize(&mut self) {
        if let Some(h) = self.bedtime_hour {
            if h > 23 || (9..=17).contains(&h) {
                warn!(bedtime_hour = h, "dropping implausible bedtime hour");
                self.bedtime_hour = None;
                self.bedtime_minute = None;
            }
        }
        if let Some(h) = self.wake_hour {
            if h > 23 {
                warn!(wake_hour = h, "dropping out-of-range wake hour");
                self.wake_hour = None;
                self.wake_minute = None;
            }
        }
        if self.bedtime_minute.map_or(false, |m| m > 59) {
            self.bedtime_minute = None;
        }
        if self.wake_minute.map_or(false, |m| m > 59) {
            self.wake_minute = None;
        }
        if self.duration_hours.map_or(false, |d| !(0.0..=24.0).contains(&d)) {
            warn!("dropping out-of-range sleep duration");
            self.duration_hours = None;
        }
    }
}

/// Kind of exercise session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Run,
    Walk,
    Gym,
    Weights,
    Yoga,
    Swim,
    Cycle,
    Other,
}

impl ExerciseType {
    /// Strength-training variants for which trained muscle groups matter
    pub fn is_strength(self) -> bool {
        matches!(self, ExerciseType::Gym | ExerciseType::Weights)
    }
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExerciseType::Run => "run",
            ExerciseType::Walk => "walk",
            ExerciseType::Gym => "gym",
            ExerciseType::Weights => "weights",
            ExerciseType::Yoga => "yoga",
            ExerciseType::Swim => "swim",
            ExerciseType::Cycle => "cycle",
            ExerciseType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Muscle group trained in a strength session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    FullBody,
    Chest,
    Biceps,
    Triceps,
    Shoulders,
    Back,
    Abs,
    LowerBody,
    Other,
}

impl MuscleGroup {
    /// Human-readable form used in prompts and summaries
    pub fn label(self) -> &'static str {
        match self {
            MuscleGroup::FullBody => "full body",
            MuscleGroup::Chest => "chest",
            MuscleGroup::Biceps => "biceps",
            MuscleGroup::Triceps => "triceps",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Back => "back",
            MuscleGroup::Abs => "abs",
            MuscleGroup::LowerBody => "lower body",
            MuscleGroup::Other => "other",
        }
    }
}

/// A single exercise / training session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub exercise_type: Option<ExerciseType>,
    /// Muscle groups trained, only meaningful for gym/weights sessions
    #[serde(default)]
    pub body_parts: Option<Vec<MuscleGroup>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    /// Perceived intensity, 1-10
    #[serde(default)]
    pub intensity: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExerciseEntry {
    /// Drop out-of-range fields; truncate the note to its length cap.
    pub fn sanitize(&mut self) {
        if self
            .duration_minutes
            .map_or(false, |d| d == 0 || d > MAX_EXERCISE_MINUTES)
        {
            warn!(minutes = self.duration_minutes, "dropping out-of-range exercise duration");
            self.duration_minutes = None;
        }
        if self.distance_km.map_or(false, |d| !d.is_finite() || d < 0.0) {
            warn!("dropping negative exercise distance");
            self.distance_km = None;
        }
        if self.intensity.map_or(false, |i| !(1..=10).contains(&i)) {
            warn!(intensity = self.intensity, "dropping out-of-range intensity");
            self.intensity = None;
        }
        if let Some(parts) = &mut self.body_parts {
            if parts.is_empty() {
                self.body_parts = None;
            }
        }
        if let Some(notes) = &mut self.notes {
            truncate_chars(notes, MAX_EXERCISE_NOTE_CHARS);
        }
    }
}

/// Kind of meditation practice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeditationType {
    Meditation,
    Cleaning,
    Sitting,
    GroupMeditation,
    Other,
}

impl MeditationType {
    pub fn label(self) -> &'static str {
        match self {
            MeditationType::Meditation => "meditation",
            MeditationType::Cleaning => "cleaning",
            MeditationType::Sitting => "sitting",
            MeditationType::GroupMeditation => "group meditation",
            MeditationType::Other => "other",
        }
    }
}

/// Daily wellness log: meditation, mood, energy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WellnessEntry {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Time of the session as the user phrased it, e.g. "07:30" or "7am"
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub meditation_minutes: Option<u32>,
    #[serde(default)]
    pub meditation_type: Option<MeditationType>,
    /// Mood, 1-10
    #[serde(default)]
    pub mood_score: Option<u8>,
    /// Energy level, 1-10
    #[serde(default)]
    pub energy_level: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WellnessEntry {
    pub fn sanitize(&mut self) {
        if self.mood_score.map_or(false, |s| !(1..=10).contains(&s)) {
            warn!(mood = self.mood_score, "dropping out-of-range mood score");
            self.mood_score = None;
        }
        if self.energy_level.map_or(false, |s| !(1..=10).contains(&s)) {
            warn!(energy = self.energy_level, "dropping out-of-range energy level");
            self.energy_level = None;
        }
        if let Some(notes) = &mut self.notes {
            truncate_chars(notes, MAX_WELLNESS_NOTE_CHARS);
        }
    }
}

/// A to-do item captured from the conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    /// The actual action item text
    pub task: String,
    /// 1=high, 2=medium, 3=low
    #[serde(default)]
    pub priority: Option<u8>,
}

impl TaskItem {
    pub fn sanitize(&mut self) {
        if self.priority.map_or(false, |p| !(1..=3).contains(&p)) {
            warn!(priority = self.priority, "dropping out-of-range task priority");
            self.priority = None;
        }
    }
}

/// A web link to read later
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingLink {
    pub url: String,
    /// Optional note about why to read this
    #[serde(default)]
    pub context: Option<String>,
}

impl ReadingLink {
    /// Return the URL without a trailing slash on a bare origin.
    pub fn url_str(&self) -> &str {
        let raw = self.url.as_str();
        if raw.ends_with('/') && raw.matches('/').count() == 3 {
            &raw[..raw.len() - 1]
        } else {
            raw
        }
    }
}

/// Validate a reading-link URL: http/https scheme, a non-empty host, and no
/// embedded whitespace or commas (artifacts of the model splitting lists).
pub fn is_valid_url(url: &str) -> bool {
    let rest = if let Some(r) = url.strip_prefix("https://") {
        r
    } else if let Some(r) = url.strip_prefix("http://") {
        r
    } else {
        return false;
    };
    !rest.is_empty() && !url.chars().any(|c| c.is_whitespace() || c == ',')
}

/// Everything extracted from (or accumulated across) chat turns.
///
/// One value of this type is produced per extraction attempt (the
/// candidate) and one is carried in the conversation state (the
/// accumulation). Sleep and wellness are singular per turn; the remaining
/// categories are ordered lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub sleep: Option<SleepEntry>,
    #[serde(default)]
    pub exercise: Vec<ExerciseEntry>,
    #[serde(default)]
    pub wellness: Option<WellnessEntry>,
    #[serde(default)]
    pub tasks: Vec<TaskItem>,
    #[serde(default)]
    pub reading_links: Vec<ReadingLink>,
    #[serde(default)]
    pub journal_note: Option<String>,
}

impl Entities {
    /// True when no category holds any data
    pub fn is_empty(&self) -> bool {
        self.sleep.is_none()
            && self.exercise.is_empty()
            && self.wellness.is_none()
            && self.tasks.is_empty()
            && self.reading_links.is_empty()
            && self.journal_note.is_none()
    }

    /// Validate every field, dropping what is malformed.
    ///
    /// Dropping is the contract for validation failures: a bad field never
    /// fails the turn, it just does not survive into the merge.
    pub fn sanitize(&mut self) {
        if let Some(sleep) = &mut self.sleep {
            sleep.sanitize();
        }
        for session in &mut self.exercise {
            session.sanitize();
        }
        if let Some(wellness) = &mut self.wellness {
            wellness.sanitize();
        }
        for task in &mut self.tasks {
            task.sanitize();
        }
        self.tasks.retain(|t| !t.task.trim().is_empty());
        self.reading_links.retain(|l| {
            let ok = is_valid_url(&l.url);
            if !ok {
                warn!(url = %l.url, "dropping invalid reading link");
            }
            ok
        });
        if self.journal_note.as_deref().map_or(false, |n| n.trim().is_empty()) {
            self.journal_note = None;
        }
    }
}

/// Convert merged entities to the flat records handed to the record store.
///
/// Each record is a flat mapping carrying a `type` tag and a `date`; entries
/// without their own date get `reference_date`.
pub fn to_flat_records(entities: &Entities, reference_date: NaiveDate) -> Vec<FlatRecord> {
    let mut records = Vec::new();

    if let Some(sleep) = &entities.sleep {
        records.extend(flatten(sleep, RECORD_SLEEP, reference_date));
    }
    for session in &entities.exercise {
        records.extend(flatten(session, RECORD_EXERCISE, reference_date));
    }
    if let Some(wellness) = &entities.wellness {
        records.extend(flatten(wellness, RECORD_WELLNESS, reference_date));
    }
    for task in &entities.tasks {
        records.extend(flatten(task, RECORD_TASK, reference_date));
    }
    for link in &entities.reading_links {
        records.extend(flatten(link, RECORD_READING_LINK, reference_date));
    }
    if let Some(note) = &entities.journal_note {
        let mut record = FlatRecord::new();
        record.insert("type".into(), RECORD_JOURNAL.into());
        record.insert("date".into(), reference_date.to_string().into());
        record.insert("note".into(), note.as_str().into());
        records.push(record);
    }

    records
}

/// Flatten one serializable entry into a tagged record, skipping nulls.
fn flatten<T: Serialize>(entry: &T, type_tag: &str, fallback_date: NaiveDate) -> Option<FlatRecord> {
    let value = match serde_json::to_value(entry) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) | Err(_) => return None,
    };
    let mut record: FlatRecord = value.into_iter().filter(|(_, v)| !v.is_null()).collect();
    record.insert("type".into(), type_tag.into());
    record
        .entry("date".to_string())
        .or_insert_with(|| fallback_date.to_string().into());
    Some(record)
}

/// Truncate a string in place to at most `max_chars` characters, never
/// splitting a character.
pub(crate) fn truncate_chars(s: &mut String, max_chars: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
}
