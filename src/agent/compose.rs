//! Response composer
//!
//! Renders the user-facing confirmation of what was logged: one line per
//! populated category with a fixed icon and a compact field summary. Pure
//! function over the merged entities; the turn controller appends sync
//! failure notes separately.

use crate::types::{Entities, ExerciseEntry, SleepEntry, TaskItem, WellnessEntry};

/// Reply when a merge produced nothing worth saving
pub const NOTHING_TO_SAVE: &str = "No data extracted to save.";

/// Header above the per-category summary lines
const CONFIRMATION_HEADER: &str = "I have logged the following:";

/// Build the confirmation summary for persisted entities.
pub fn confirmation(entities: &Entities) -> String {
    if entities.is_empty() {
        return NOTHING_TO_SAVE.to_string();
    }

    let mut lines = vec![CONFIRMATION_HEADER.to_string()];

    if let Some(sleep) = &entities.sleep {
        lines.push(format!("🛏️ Sleep: {}", sleep_summary(sleep)));
    }
    for session in &entities.exercise {
        lines.push(format!("🏃 Exercise: {}", exercise_summary(session)));
    }
    if let Some(wellness) = &entities.wellness {
        lines.push(format!("🧘 Wellness: {}", wellness_summary(wellness)));
    }
    if let Some(note) = &entities.journal_note {
        lines.push(format!("📝 Journal: {}", preview(note)));
    }
    if !entities.tasks.is_empty() {
        let items: Vec<String> = entities.tasks.iter().map(task_summary).collect();
        lines.push(format!("✅ Tasks: {}", items.join("; ")));
    }
    if !entities.reading_links.is_empty() {
        let items: Vec<&str> = entities.reading_links.iter().map(|l| l.url_str()).collect();
        lines.push(format!("🔖 Reading: {}", items.join(", ")));
    }

    lines.join("\n")
}

pub(crate) fn sleep_summary(sleep: &SleepEntry) -> String {
    let mut parts = Vec::new();
    if let Some(date) = sleep.date {
        parts.push(date.to_string());
    }
    if let Some(hours) = sleep.duration_hours {
        parts.push(format!("{} hrs", hours));
    }
    if let Some(hour) = sleep.bedtime_hour {
        parts.push(format!("bed {:02}:{:02}", hour, sleep.bedtime_minute.unwrap_or(0)));
    }
    if let Some(hour) = sleep.wake_hour {
        parts.push(format!("wake {:02}:{:02}", hour, sleep.wake_minute.unwrap_or(0)));
    }
    if let Some(quality) = sleep.quality {
        parts.push(format!("quality {}", quality));
    }
    if let Some(notes) = &sleep.notes {
        parts.push(preview(notes));
    }
    parts.join(" | ")
}

pub(crate) fn exercise_summary(session: &ExerciseEntry) -> String {
    let mut parts = Vec::new();
    if let Some(date) = session.date {
        parts.push(date.to_string());
    }
    if let Some(kind) = session.exercise_type {
        parts.push(kind.to_string());
    }
    if let Some(parts_list) = &session.body_parts {
        let labels: Vec<&str> = parts_list.iter().map(|p| p.label()).collect();
        if !labels.is_empty() {
            parts.push(labels.join("/"));
        }
    }
    if let Some(minutes) = session.duration_minutes {
        parts.push(format!("{} mins", minutes));
    }
    if let Some(km) = session.distance_km {
        parts.push(format!("{} km", km));
    }
    if let Some(intensity) = session.intensity {
        parts.push(format!("intensity {}/10", intensity));
    }
    if let Some(notes) = &session.notes {
        parts.push(preview(notes));
    }
    parts.join(" | ")
}

pub(crate) fn wellness_summary(wellness: &WellnessEntry) -> String {
    let mut parts = Vec::new();
    if let Some(date) = wellness.date {
        parts.push(date.to_string());
    }
    if let Some(time) = &wellness.time_of_day {
        parts.push(format!("@ {}", time));
    }
    if let Some(minutes) = wellness.meditation_minutes {
        match wellness.meditation_type {
            Some(kind) => parts.push(format!("{} mins {}", minutes, kind.label())),
            None => parts.push(format!("{} mins meditation", minutes)),
        }
    } else if let Some(kind) = wellness.meditation_type {
        parts.push(kind.label().to_string());
    }
    if let Some(mood) = wellness.mood_score {
        parts.push(format!("mood {}/10", mood));
    }
    if let Some(energy) = wellness.energy_level {
        parts.push(format!("energy {}/10", energy));
    }
    if let Some(notes) = &wellness.notes {
        parts.push(preview(notes));
    }
    parts.join(" | ")
}

pub(crate) fn task_summary(task: &TaskItem) -> String {
    match task.priority {
        Some(1) => format!("{} [high]", task.task),
        Some(2) => format!("{} [med]", task.task),
        Some(3) => format!("{} [low]", task.task),
        _ => task.task.clone(),
    }
}

/// First line of a note, capped for a one-line summary.
fn preview(note: &str) -> String {
    const MAX: usize = 80;
    let first_line = note.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(MAX).collect();
    if first_line.chars().count() > MAX || note.lines().count() > 1 {
        out.push('…');
    }
    out
}
