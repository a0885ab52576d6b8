//! crates/study_assistant_core/src/stats.rs
//!
//! Quiz grading and the aggregate `UserStats` shown on the dashboard.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{EpochMillis, FlashcardStatus, Resource, UserStats};
use crate::ports::PortResult;
use crate::validation::ValidationError;

/// Result of grading one quiz attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
}

/// Grades a full set of answers against a ready resource's quiz.
pub fn grade_quiz(resource: &Resource, answers: &[usize]) -> PortResult<QuizScore> {
    if !resource.is_ready() {
        return Err(ValidationError::Rejected(format!(
            "Resource {} is not ready",
            resource.id
        ))
        .into());
    }
    if resource.quiz.is_empty() {
        return Err(
            ValidationError::Rejected(format!("Resource {} has no quiz", resource.id)).into(),
        );
    }
    if answers.len() != resource.quiz.len() {
        return Err(ValidationError::Rejected(format!(
            "Expected {} answers, got {}",
            resource.quiz.len(),
            answers.len()
        ))
        .into());
    }
    let correct = resource
        .quiz
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct_answer == **a)
        .count();
    let total = resource.quiz.len();
    Ok(QuizScore {
        correct,
        total,
        percent: correct as f64 * 100.0 / total as f64,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum StudyEventKind {
    QuizAttempt { resource_id: Uuid, percent: f64 },
    StudySession { minutes: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyEvent {
    pub at: EpochMillis,
    pub kind: StudyEventKind,
}

/// In-process record of study activity.
#[derive(Debug, Default)]
pub struct ActivityLog {
    events: Mutex<Vec<StudyEvent>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: StudyEvent) {
        self.events.lock().await.push(event);
    }

    pub async fn events(&self) -> Vec<StudyEvent> {
        self.events.lock().await.clone()
    }

    pub async fn summarize(&self, resources: &[Resource], now: EpochMillis) -> UserStats {
        compute_stats(resources, &self.events.lock().await, now)
    }
}

fn day_of(millis: EpochMillis) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Consecutive UTC days with activity, counting back from today. A streak
/// that last saw activity yesterday is still alive.
fn streak_length(active_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if active_days.contains(&today) {
        today
    } else {
        match today.checked_sub_days(Days::new(1)) {
            Some(yesterday) if active_days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };
    let mut count = 0;
    while active_days.contains(&day) {
        count += 1;
        match day.checked_sub_days(Days::new(1)) {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

/// Derives `UserStats` from the current resources and recorded activity.
pub fn compute_stats(resources: &[Resource], events: &[StudyEvent], now: EpochMillis) -> UserStats {
    let cards_learned = resources
        .iter()
        .filter(|r| r.is_ready())
        .flat_map(|r| r.flashcards.iter())
        .filter(|c| c.status == FlashcardStatus::Mastered)
        .count() as u32;

    let scores: Vec<f64> = events
        .iter()
        .filter_map(|e| match e.kind {
            StudyEventKind::QuizAttempt { percent, .. } => Some(percent),
            _ => None,
        })
        .collect();
    let quiz_score_avg = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    let minutes: u64 = events
        .iter()
        .filter_map(|e| match e.kind {
            StudyEventKind::StudySession { minutes } => Some(minutes as u64),
            _ => None,
        })
        .sum();
    let hours_learned = (minutes as f64 / 60.0 * 10.0).round() / 10.0;

    let active_days: BTreeSet<NaiveDate> = events
        .iter()
        .map(|e| e.at)
        .chain(resources.iter().map(|r| r.last_accessed))
        .filter_map(day_of)
        .collect();
    let streak = day_of(now).map(|today| streak_length(&active_days, today)).unwrap_or(0);

    UserStats {
        streak,
        cards_learned,
        quiz_score_avg,
        hours_learned,
    }
}
