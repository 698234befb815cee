// src/utils/analytics.rs

use serde::Serialize;

use crate::config::PASSING_SCORE_PERCENTAGE;
use crate::models::{exam_result::QuestionOutcome, question::Domain};
use crate::utils::grading::percentage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStat {
    pub domain: Domain,
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub attempts: usize,
    pub best_percentage: f64,
    /// Average of per-attempt percentages, not of pooled questions.
    pub average_percentage: f64,
    pub passed: usize,
}

/// Accuracy per domain over every outcome given. Domains without answers are omitted.
pub fn domain_breakdown<'a, I>(outcomes: I) -> Vec<DomainStat>
where
    I: IntoIterator<Item = &'a QuestionOutcome>,
{
    let order = [Domain::People, Domain::Process, Domain::BusinessEnvironment];
    let mut tally = [(0usize, 0usize); 3];

    for outcome in outcomes {
        let slot = order
            .iter()
            .position(|d| *d == outcome.domain)
            .unwrap_or_default();
        tally[slot].1 += 1;
        if outcome.correct {
            tally[slot].0 += 1;
        }
    }

    order
        .into_iter()
        .zip(tally)
        .filter(|(_, (_, total))| *total > 0)
        .map(|(domain, (correct, total))| DomainStat {
            domain,
            correct,
            total,
            percentage: percentage(correct, total),
        })
        .collect()
}

pub fn summarize(percentages: &[f64]) -> Summary {
    if percentages.is_empty() {
        return Summary::default();
    }
    let attempts = percentages.len();
    let best = percentages.iter().copied().fold(0.0_f64, f64::max);
    let avg = percentages.iter().sum::<f64>() / attempts as f64;
    Summary {
        attempts,
        best_percentage: best,
        average_percentage: (avg * 100.0).round() / 100.0,
        passed: percentages
            .iter()
            .filter(|p| **p >= PASSING_SCORE_PERCENTAGE)
            .count(),
    }
}
