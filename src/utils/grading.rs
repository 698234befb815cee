// src/utils/grading.rs

use std::collections::{BTreeSet, HashMap};

use crate::models::{exam_result::QuestionOutcome, question::Domain};

/// The part of a question needed to grade it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnswerKey {
    pub id: i64,
    pub correct_option_ids: sqlx::types::Json<Vec<String>>,
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub correct_count: usize,
    pub total: usize,
    pub percentage: f64,
    pub outcomes: Vec<QuestionOutcome>,
}

fn normalize(ids: &[String]) -> BTreeSet<String> {
    ids.iter()
        .map(|id| id.trim().to_ascii_uppercase())
        .filter(|id| !id.is_empty())
        .collect()
}

/// An answer is correct when the selected set equals the key. Order, case and repeats are ignored.
pub fn grade_answer(selected: &[String], correct: &[String]) -> bool {
    let key = normalize(correct);
    !key.is_empty() && normalize(selected) == key
}

/// Rounded to two decimals. Zero questions yield 0.0.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = correct as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Grades a whole attempt. `keys` defines the attempt: unanswered questions are wrong,
/// answers for questions outside the attempt are ignored.
pub fn grade_attempt(keys: &[AnswerKey], answers: &HashMap<i64, Vec<String>>) -> Grade {
    let outcomes: Vec<QuestionOutcome> = keys
        .iter()
        .map(|key| {
            let selected = answers.get(&key.id).cloned().unwrap_or_default();
            QuestionOutcome {
                question_id: key.id,
                correct: grade_answer(&selected, &key.correct_option_ids),
                selected,
                domain: key.domain,
            }
        })
        .collect();

    let correct_count = outcomes.iter().filter(|o| o.correct).count();
    let total = keys.len();

    Grade {
        correct_count,
        total,
        percentage: percentage(correct_count, total),
        outcomes,
    }
}
