//! Merge engine
//!
//! Combines one turn's extraction candidate with the entities accumulated
//! over previous clarification turns, field by field. The strategy for each
//! schema field is selected by a static shape tag, not by runtime type
//! inspection:
//!
//! - singular fields (sleep, wellness) shallow-merge: candidate non-null
//!   values overwrite, accumulated values fill the gaps the candidate left
//! - list fields (exercise, tasks, reading links) smart-match before
//!   appending, so a one-line clarification completes the open item instead
//!   of duplicating it
//! - free text merges as an addendum, never a replacement, unless the new
//!   text is just a fragment of what is already there
//!
//! Confirmed data never regresses: a field that is non-null in the
//! accumulation and null in the candidate keeps its accumulated value.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::{
    Entities, ExerciseEntry, ExerciseType, ReadingLink, SleepEntry, TaskItem, WellnessEntry,
};

/// A candidate note this short is a clarifying fragment, not an addendum
const SHORT_FRAGMENT_CHARS: usize = 40;

/// Shape of a schema field; selects the merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// At most one value per conversation; merges into, never appends
    Singular,
    /// Ordered list; smart-match then append
    List,
    /// Free text; containment/length heuristic
    Text,
}

/// The candidate schema: every field the extraction may produce, with its
/// shape tag. Merge iterates this table so the field set and the dispatch
/// stay in one place.
pub const FIELD_SCHEMA: &[(&str, FieldShape)] = &[
    ("sleep", FieldShape::Singular),
    ("exercise", FieldShape::List),
    ("wellness", FieldShape::Singular),
    ("tasks", FieldShape::List),
    ("reading_links", FieldShape::List),
    ("journal_note", FieldShape::Text),
];

/// Exercise notes matching this on an `other`-typed session mean the model
/// misread a meditation practice as exercise.
static MISREAD_EXERCISE_NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(meditat\w*|cleaning|sitting|satsang)\b").expect("valid regex"));

/// Merge a new extraction candidate into the accumulated entities.
///
/// Consumes the candidate; the accumulation is updated in place. Derives
/// the sleep duration and applies the misclassified-exercise backstop after
/// the field merges.
pub fn merge(accumulated: &mut Entities, candidate: Entities) {
    let mut candidate = candidate;

    for (name, shape) in FIELD_SCHEMA {
        match (*name, *shape) {
            ("sleep", FieldShape::Singular) => {
                merge_singular(&mut accumulated.sleep, candidate.sleep.take(), absorb_sleep);
            }
            ("wellness", FieldShape::Singular) => {
                merge_singular(
                    &mut accumulated.wellness,
                    candidate.wellness.take(),
                    absorb_wellness,
                );
            }
            ("exercise", FieldShape::List) => {
                merge_list(
                    &mut accumulated.exercise,
                    std::mem::take(&mut candidate.exercise),
                );
            }
            ("tasks", FieldShape::List) => {
                merge_list(&mut accumulated.tasks, std::mem::take(&mut candidate.tasks));
            }
            ("reading_links", FieldShape::List) => {
                merge_list(
                    &mut accumulated.reading_links,
                    std::mem::take(&mut candidate.reading_links),
                );
            }
            ("journal_note", FieldShape::Text) => {
                merge_text(&mut accumulated.journal_note, candidate.journal_note.take());
            }
            (name, shape) => {
                // The schema table and this dispatch must stay in sync.
                unreachable!("unhandled schema field {:?} with shape {:?}", name, shape);
            }
        }
    }

    if let Some(sleep) = &mut accumulated.sleep {
        sleep.derive_duration();
    }
    drop_misread_exercise(accumulated);
}

/// Singular strategy: absent-or-present handling around a field-wise absorb.
fn merge_singular<T>(accumulated: &mut Option<T>, candidate: Option<T>, absorb: fn(&mut T, T)) {
    match (accumulated.as_mut(), candidate) {
        (Some(old), Some(new)) => absorb(old, new),
        (None, Some(new)) => *accumulated = Some(new),
        _ => {}
    }
}

/// Candidate non-null wins; accumulated fills what the candidate left null.
fn fill<T>(old: &mut Option<T>, new: Option<T>) {
    if new.is_some() {
        *old = new;
    }
}

fn absorb_sleep(old: &mut SleepEntry, new: SleepEntry) {
    fill(&mut old.date, new.date);
    fill(&mut old.bedtime_hour, new.bedtime_hour);
    fill(&mut old.bedtime_minute, new.bedtime_minute);
    fill(&mut old.wake_hour, new.wake_hour);
    fill(&mut old.wake_minute, new.wake_minute);
    fill(&mut old.duration_hours, new.duration_hours);
    fill(&mut old.quality, new.quality);
    merge_text(&mut old.notes, new.notes);
}

fn absorb_wellness(old: &mut WellnessEntry, new: WellnessEntry) {
    fill(&mut old.date, new.date);
    fill(&mut old.time_of_day, new.time_of_day);
    fill(&mut old.meditation_minutes, new.meditation_minutes);
    fill(&mut old.meditation_type, new.meditation_type);
    fill(&mut old.mood_score, new.mood_score);
    fill(&mut old.energy_level, new.energy_level);
    merge_text(&mut old.notes, new.notes);
}

/// Free-text strategy.
///
/// A fragment (substring of the old text, very short, or much shorter than
/// the old text) is the user clarifying, not adding; keep the old text.
/// Anything else is appended as an addendum.
fn merge_text(old: &mut Option<String>, new: Option<String>) {
    match (old.as_mut(), new) {
        (Some(existing), Some(incoming)) => {
            *existing = combine_text(existing, &incoming);
        }
        (None, Some(incoming)) => *old = Some(incoming),
        _ => {}
    }
}

pub(crate) fn combine_text(old: &str, new: &str) -> String {
    if old.contains(new) {
        return old.to_string();
    }
    if new.chars().count() <= SHORT_FRAGMENT_CHARS || new.len() * 2 < old.len() {
        return old.to_string();
    }
    format!("{}\n\n{}", old, new)
}

/// An item that knows how to match and fold a clarifying candidate item.
trait SmartMerge {
    /// Discriminating-key match against an existing item
    fn same_key(&self, candidate: &Self) -> bool;

    /// True when `self` has a null field the candidate supplies. Items
    /// whose key is a required field (tasks, links) never gap-match: a new
    /// item always carries its key, so a key mismatch means a new entry.
    fn has_gap_for(&self, candidate: &Self) -> bool;

    /// Field-union: candidate non-null overwrites, existing fills gaps
    fn absorb(&mut self, candidate: Self);
}

/// List strategy: each candidate item first tries to complete an existing
/// unmatched item (by key, then by gap), and is appended only when nothing
/// matches. Each accumulated item absorbs at most one candidate per merge.
fn merge_list<T: SmartMerge>(accumulated: &mut Vec<T>, candidates: Vec<T>) {
    let mut consumed = vec![false; accumulated.len()];
    for item in candidates {
        let by_key = (0..consumed.len())
            .find(|&i| !consumed[i] && accumulated[i].same_key(&item));
        let target = by_key.or_else(|| {
            (0..consumed.len()).find(|&i| !consumed[i] && accumulated[i].has_gap_for(&item))
        });
        match target {
            Some(i) => {
                debug!(index = i, "completing existing list item from candidate");
                consumed[i] = true;
                accumulated[i].absorb(item);
            }
            None => accumulated.push(item),
        }
    }
}

impl SmartMerge for ExerciseEntry {
    fn same_key(&self, candidate: &Self) -> bool {
        matches!(
            (self.exercise_type, candidate.exercise_type),
            (Some(a), Some(b)) if a == b
        )
    }

    fn has_gap_for(&self, candidate: &Self) -> bool {
        (self.exercise_type.is_none() && candidate.exercise_type.is_some())
            || (self.duration_minutes.is_none() && candidate.duration_minutes.is_some())
            || (self.body_parts.is_none() && candidate.body_parts.is_some())
            || (self.distance_km.is_none() && candidate.distance_km.is_some())
            || (self.intensity.is_none() && candidate.intensity.is_some())
            || (self.notes.is_none() && candidate.notes.is_some())
    }

    fn absorb(&mut self, candidate: Self) {
        fill(&mut self.date, candidate.date);
        fill(&mut self.exercise_type, candidate.exercise_type);
        fill(&mut self.body_parts, candidate.body_parts);
        fill(&mut self.duration_minutes, candidate.duration_minutes);
        fill(&mut self.distance_km, candidate.distance_km);
        fill(&mut self.intensity, candidate.intensity);
        merge_text(&mut self.notes, candidate.notes);
    }
}

impl SmartMerge for TaskItem {
    fn same_key(&self, candidate: &Self) -> bool {
        self.task.trim().eq_ignore_ascii_case(candidate.task.trim())
    }

    fn has_gap_for(&self, _candidate: &Self) -> bool {
        false
    }

    fn absorb(&mut self, candidate: Self) {
        fill(&mut self.priority, candidate.priority);
    }
}

impl SmartMerge for ReadingLink {
    fn same_key(&self, candidate: &Self) -> bool {
        self.url_str() == candidate.url_str()
    }

    fn has_gap_for(&self, _candidate: &Self) -> bool {
        false
    }

    fn absorb(&mut self, candidate: Self) {
        merge_text(&mut self.context, candidate.context);
    }
}

/// Classification backstop: the extractor sometimes reads a meditation
/// practice ("20 min of cleaning") as an `other` exercise session.
fn drop_misread_exercise(entities: &mut Entities) {
    entities.exercise.retain(|session| {
        let misread = session.exercise_type == Some(ExerciseType::Other)
            && session
                .notes
                .as_deref()
                .map_or(false, |n| MISREAD_EXERCISE_NOTE.is_match(n));
        if misread {
            warn!(notes = session.notes.as_deref(), "dropping exercise session that looks like meditation");
        }
        !misread
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MuscleGroup, SleepQuality};
    use pretty_assertions::assert_eq;

    fn sleep(duration: Option<f64>, quality: Option<SleepQuality>) -> SleepEntry {
        SleepEntry { duration_hours: duration, quality, ..Default::default() }
    }

    #[test]
    fn empty_candidate_changes_nothing() {
        let mut acc = Entities {
            sleep: Some(sleep(Some(5.0), None)),
            ..Default::default()
        };
        let before = acc.clone();
        merge(&mut acc, Entities::default());
        assert_eq!(acc, before);
    }

    #[test]
    fn accumulated_fields_never_regress() {
        let mut acc = Entities {
            sleep: Some(SleepEntry {
                bedtime_hour: Some(22),
                duration_hours: Some(9.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        // Candidate mentions only quality; bedtime and duration must survive.
        let candidate = Entities {
            sleep: Some(sleep(None, Some(SleepQuality::Good))),
            ..Default::default()
        };
        merge(&mut acc, candidate);
        let merged = acc.sleep.unwrap();
        assert_eq!(merged.bedtime_hour, Some(22));
        assert_eq!(merged.duration_hours, Some(9.0));
        assert_eq!(merged.quality, Some(SleepQuality::Good));
    }

    #[test]
    fn candidate_overwrites_singular_scalars() {
        let mut acc = Entities {
            sleep: Some(sleep(Some(5.0), Some(SleepQuality::Poor))),
            ..Default::default()
        };
        let candidate = Entities {
            sleep: Some(sleep(Some(6.5), None)),
            ..Default::default()
        };
        merge(&mut acc, candidate);
        let merged = acc.sleep.unwrap();
        assert_eq!(merged.duration_hours, Some(6.5));
        assert_eq!(merged.quality, Some(SleepQuality::Poor));
    }

    #[test]
    fn clarification_completes_open_exercise_instead_of_duplicating() {
        let mut acc = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Run),
                ..Default::default()
            }],
            ..Default::default()
        };
        let candidate = Entities {
            exercise: vec![ExerciseEntry {
                duration_minutes: Some(30),
                ..Default::default()
            }],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.exercise.len(), 1);
        assert_eq!(acc.exercise[0].exercise_type, Some(ExerciseType::Run));
        assert_eq!(acc.exercise[0].duration_minutes, Some(30));
    }

    #[test]
    fn same_type_sessions_merge_by_key() {
        let mut acc = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Gym),
                duration_minutes: Some(45),
                ..Default::default()
            }],
            ..Default::default()
        };
        let candidate = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Gym),
                body_parts: Some(vec![MuscleGroup::Chest, MuscleGroup::Triceps]),
                ..Default::default()
            }],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.exercise.len(), 1);
        assert_eq!(acc.exercise[0].duration_minutes, Some(45));
        assert_eq!(
            acc.exercise[0].body_parts,
            Some(vec![MuscleGroup::Chest, MuscleGroup::Triceps])
        );
    }

    #[test]
    fn unrelated_session_appends() {
        let mut acc = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Run),
                duration_minutes: Some(30),
                ..Default::default()
            }],
            ..Default::default()
        };
        let candidate = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Yoga),
                duration_minutes: Some(20),
                ..Default::default()
            }],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.exercise.len(), 2);
    }

    #[test]
    fn each_accumulated_item_absorbs_at_most_one_candidate() {
        let mut acc = Entities {
            exercise: vec![ExerciseEntry::default()],
            ..Default::default()
        };
        let candidate = Entities {
            exercise: vec![
                ExerciseEntry { duration_minutes: Some(30), ..Default::default() },
                ExerciseEntry { duration_minutes: Some(45), ..Default::default() },
            ],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        // First candidate completes the open item, second appends.
        assert_eq!(acc.exercise.len(), 2);
        assert_eq!(acc.exercise[0].duration_minutes, Some(30));
        assert_eq!(acc.exercise[1].duration_minutes, Some(45));
    }

    #[test]
    fn duplicate_task_fills_priority() {
        let mut acc = Entities {
            tasks: vec![TaskItem { task: "Buy milk".into(), priority: None }],
            ..Default::default()
        };
        let candidate = Entities {
            tasks: vec![
                TaskItem { task: "buy milk".into(), priority: Some(1) },
                TaskItem { task: "call mom".into(), priority: None },
            ],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.tasks.len(), 2);
        assert_eq!(acc.tasks[0].priority, Some(1));
        assert_eq!(acc.tasks[1].task, "call mom");
    }

    #[test]
    fn short_note_is_a_fragment_not_an_addendum() {
        assert_eq!(combine_text("went for a long run around the lake", "30 minutes"),
            "went for a long run around the lake");
    }

    #[test]
    fn contained_note_keeps_old() {
        let old = "felt calm after the morning sitting, mind much quieter than yesterday";
        assert_eq!(combine_text(old, "morning sitting"), old);
    }

    #[test]
    fn substantial_new_note_is_appended() {
        let old = "strong session today, new squat PR at the gym and good energy after";
        let new = "also tried the new rowing machine for a while and paced well through it";
        assert_eq!(combine_text(old, new), format!("{}\n\n{}", old, new));
    }

    #[test]
    fn journal_note_merges_as_text() {
        let mut acc = Entities {
            journal_note: Some("productive morning writing the report".into()),
            ..Default::default()
        };
        let candidate = Entities {
            journal_note: Some("report".into()),
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.journal_note.as_deref(), Some("productive morning writing the report"));
    }

    #[test]
    fn misread_meditation_session_is_dropped() {
        let mut acc = Entities::default();
        let candidate = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Other),
                notes: Some("evening cleaning practice".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert!(acc.exercise.is_empty());
    }

    #[test]
    fn genuine_other_exercise_survives_the_backstop() {
        let mut acc = Entities::default();
        let candidate = Entities {
            exercise: vec![ExerciseEntry {
                exercise_type: Some(ExerciseType::Other),
                notes: Some("bouldering at the new gym".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.exercise.len(), 1);
    }

    #[test]
    fn sleep_duration_is_derived_after_merge() {
        let mut acc = Entities {
            sleep: Some(SleepEntry { bedtime_hour: Some(23), ..Default::default() }),
            ..Default::default()
        };
        let candidate = Entities {
            sleep: Some(SleepEntry {
                wake_hour: Some(6),
                wake_minute: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        merge(&mut acc, candidate);
        assert_eq!(acc.sleep.unwrap().duration_hours, Some(7.5));
    }
}
