//! crates/study_assistant_core/src/validation.rs
//!
//! Ingestion checks for generated artifacts. A bundle that fails any of these
//! checks is rejected as a whole; nothing from it reaches stored state.

use std::collections::HashSet;

use crate::domain::{ArtifactBundle, FlashcardDraft, QuizQuestion, QuizQuestionDraft};

/// Reasons an artifact bundle or a field value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Summary is empty")]
    EmptySummary,
    #[error("No flashcards were generated")]
    NoFlashcards,
    #[error("Flashcard {index} has an empty front or back")]
    BlankFlashcard { index: usize },
    #[error("Quiz question {index} has no question text")]
    BlankQuestion { index: usize },
    #[error("Quiz question {index} has a blank option")]
    BlankOption { index: usize },
    #[error("Quiz question {index} has {count} options; at least 2 are required")]
    TooFewOptions { index: usize, count: usize },
    #[error("Quiz question {index} repeats the option '{option}'")]
    DuplicateOption { index: usize, option: String },
    #[error("Quiz question {index} marks answer {answer} correct but only has {count} options")]
    AnswerOutOfRange {
        index: usize,
        answer: usize,
        count: usize,
    },
    #[error("Unknown {field}: '{value}'")]
    UnknownValue { field: &'static str, value: String },
    #[error("{0}")]
    Rejected(String),
}

/// Checks the text, option list and answer index of a single quiz question.
pub fn check_question(
    index: usize,
    question: &str,
    options: &[String],
    correct_answer: usize,
) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::BlankQuestion { index });
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(ValidationError::BlankOption { index });
    }
    if options.len() < 2 {
        return Err(ValidationError::TooFewOptions {
            index,
            count: options.len(),
        });
    }
    let mut seen = HashSet::new();
    for option in options {
        if !seen.insert(option.trim().to_lowercase()) {
            return Err(ValidationError::DuplicateOption {
                index,
                option: option.clone(),
            });
        }
    }
    if correct_answer >= options.len() {
        return Err(ValidationError::AnswerOutOfRange {
            index,
            answer: correct_answer,
            count: options.len(),
        });
    }
    Ok(())
}

pub fn check_flashcard(index: usize, card: &FlashcardDraft) -> Result<(), ValidationError> {
    if card.front.trim().is_empty() || card.back.trim().is_empty() {
        return Err(ValidationError::BlankFlashcard { index });
    }
    Ok(())
}

impl QuizQuestionDraft {
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        check_question(index, &self.question, &self.options, self.correct_answer)
    }
}

impl QuizQuestion {
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        check_question(index, &self.question, &self.options, self.correct_answer)
    }
}

impl ArtifactBundle {
    /// Validates a bundle before it is written into a `ready` resource.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.summary.trim().is_empty() {
            return Err(ValidationError::EmptySummary);
        }
        if self.flashcards.is_empty() {
            return Err(ValidationError::NoFlashcards);
        }
        for (i, card) in self.flashcards.iter().enumerate() {
            check_flashcard(i, card)?;
        }
        for (i, q) in self.quiz.iter().enumerate() {
            q.validate(i)?;
        }
        Ok(())
    }

    /// Reduces a partial bundle to what may be kept on a failed resource:
    /// the summary, the well-formed flashcards, and the quiz only if every
    /// question in it is valid.
    pub fn salvage(mut self) -> Self {
        self.flashcards = self
            .flashcards
            .into_iter()
            .enumerate()
            .filter(|(i, c)| check_flashcard(*i, c).is_ok())
            .map(|(_, c)| c)
            .collect();
        if self.quiz.iter().enumerate().any(|(i, q)| q.validate(i).is_err()) {
            self.quiz.clear();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: &[&str], correct_answer: usize) -> QuizQuestionDraft {
        QuizQuestionDraft {
            question: "Which?".to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer,
            explanation: String::new(),
        }
    }

    fn bundle() -> ArtifactBundle {
        ArtifactBundle {
            summary: "# Topic".to_string(),
            flashcards: vec![FlashcardDraft {
                front: "Q".to_string(),
                back: "A".to_string(),
            }],
            quiz: vec![question(&["A", "B", "C", "D"], 2)],
        }
    }

    #[test]
    fn well_formed_bundle_passes() {
        assert_eq!(bundle().validate(), Ok(()));
    }

    #[test]
    fn answer_index_must_be_in_range() {
        let mut b = bundle();
        b.quiz.push(question(&["A", "B"], 2));
        assert_eq!(
            b.validate(),
            Err(ValidationError::AnswerOutOfRange {
                index: 1,
                answer: 2,
                count: 2
            })
        );
    }

    #[test]
    fn single_option_question_is_rejected() {
        let mut b = bundle();
        b.quiz = vec![question(&["Only"], 0)];
        assert!(matches!(
            b.validate(),
            Err(ValidationError::TooFewOptions { count: 1, .. })
        ));
    }

    #[test]
    fn duplicate_options_are_rejected_ignoring_case() {
        let mut b = bundle();
        b.quiz = vec![question(&["Mitochondria", " mitochondria", "Nucleus"], 0)];
        assert!(matches!(
            b.validate(),
            Err(ValidationError::DuplicateOption { index: 0, .. })
        ));
    }

    #[test]
    fn blank_question_text_and_blank_options_are_rejected() {
        let mut b = bundle();
        b.quiz[0].question = "  ".to_string();
        assert_eq!(b.validate(), Err(ValidationError::BlankQuestion { index: 0 }));

        let mut b = bundle();
        b.quiz.push(question(&["Nucleus", " "], 0));
        assert_eq!(b.validate(), Err(ValidationError::BlankOption { index: 1 }));
    }

    #[test]
    fn empty_summary_and_missing_flashcards_are_rejected() {
        let mut b = bundle();
        b.summary = "   ".to_string();
        assert_eq!(b.validate(), Err(ValidationError::EmptySummary));

        let mut b = bundle();
        b.flashcards.clear();
        assert_eq!(b.validate(), Err(ValidationError::NoFlashcards));
    }

    #[test]
    fn salvage_drops_invalid_quiz_and_blank_cards() {
        let mut b = bundle();
        b.flashcards.push(FlashcardDraft {
            front: String::new(),
            back: "orphan".to_string(),
        });
        b.quiz.push(question(&["A"], 0));
        let kept = b.salvage();
        assert_eq!(kept.flashcards.len(), 1);
        assert!(kept.quiz.is_empty());
        assert_eq!(kept.summary, "# Topic");
    }
}
