//! XP delta rules.
//!
//! Lectures are symmetric: unmarking takes back what marking gave. Quizzes
//! only ever pay out the improvement over the best earlier attempt.

/// XP change for setting a lecture's completion mark to `requested`.
///
/// `current` is `None` when the learner has never touched the lecture.
pub fn lecture_delta(current: Option<bool>, requested: bool, gain: i64) -> i64 {
    let was_marked = current.unwrap_or(false);
    match (was_marked, requested) {
        (false, true) => gain,
        (true, false) => -gain,
        _ => 0,
    }
}

/// XP change for a new quiz score given the best of all earlier attempts.
///
/// `previous_best` is `None` when this is the first attempt.
pub fn quiz_delta(previous_best: Option<i64>, score: i64) -> i64 {
    (score - previous_best.unwrap_or(0)).max(0)
}

/// Resulting total after applying `delta`. XP never drops below zero.
pub fn apply_delta(total: i64, delta: i64) -> i64 {
    total.saturating_add(delta).max(0)
}
