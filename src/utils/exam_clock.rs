// src/utils/exam_clock.rs

//! Simulation clock derived from stored timestamps.
//!
//! The exam clock runs from `started_at` and stops while a break is running.
//! A break lasts at most `BREAK_DURATION_SECS`; any overrun counts as exam time.
//! Breaks are offered at fixed answered-question checkpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{BREAK_CHECKPOINTS, BREAK_DURATION_SECS};
use crate::models::exam::ExamRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BreakError {
    #[error("Exam time is over")]
    Expired,
    #[error("A break is already running")]
    AlreadyOnBreak,
    #[error("No break is available at this point of the exam")]
    NotAtCheckpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamClock {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub question_count: i32,
    pub breaks_taken: i32,
    pub break_started_at: Option<DateTime<Utc>>,
    pub paused_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockStatus {
    pub remaining_seconds: i64,
    pub expired: bool,
    pub on_break: bool,
    pub break_remaining_seconds: i64,
    pub breaks_taken: i32,
    /// Answered count at which the next break becomes available.
    pub next_break_at: Option<i32>,
}

impl ExamClock {
    pub fn new(started_at: DateTime<Utc>, duration_seconds: i64, question_count: i32) -> Self {
        Self {
            started_at,
            duration_seconds,
            question_count,
            breaks_taken: 0,
            break_started_at: None,
            paused_seconds: 0,
        }
    }

    pub fn from_run(run: &ExamRun) -> Self {
        Self {
            started_at: run.started_at,
            duration_seconds: run.duration_seconds,
            question_count: run.question_ids.0.len() as i32,
            breaks_taken: run.breaks_taken,
            break_started_at: run.break_started_at,
            paused_seconds: run.paused_seconds,
        }
    }

    fn break_elapsed(&self, now: DateTime<Utc>) -> i64 {
        self.break_started_at
            .map(|start| (now - start).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// Paused time credited for the break currently open, if any.
    fn open_break_credit(&self, now: DateTime<Utc>) -> i64 {
        self.break_elapsed(now).min(BREAK_DURATION_SECS)
    }

    pub fn active_elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let wall = (now - self.started_at).num_seconds();
        (wall - self.paused_seconds - self.open_break_credit(now)).max(0)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.duration_seconds - self.active_elapsed_seconds(now)).max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(now) == 0
    }

    pub fn on_break(&self, now: DateTime<Utc>) -> bool {
        self.break_started_at.is_some() && self.break_elapsed(now) < BREAK_DURATION_SECS
    }

    pub fn break_remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        if self.on_break(now) {
            BREAK_DURATION_SECS - self.break_elapsed(now)
        } else {
            0
        }
    }

    /// Index of the latest checkpoint reached by `answered_count` that fits in this run.
    fn reached_checkpoint(&self, answered_count: i32) -> Option<usize> {
        BREAK_CHECKPOINTS
            .iter()
            .enumerate()
            .filter(|(_, at)| **at < self.question_count && answered_count >= **at)
            .map(|(i, _)| i)
            .last()
    }

    pub fn next_break_at(&self) -> Option<i32> {
        BREAK_CHECKPOINTS
            .iter()
            .skip(self.breaks_taken.max(0) as usize)
            .copied()
            .find(|at| *at < self.question_count)
    }

    pub fn can_start_break(&self, answered_count: i32, now: DateTime<Utc>) -> Result<usize, BreakError> {
        if self.is_expired(now) {
            return Err(BreakError::Expired);
        }
        if self.on_break(now) {
            return Err(BreakError::AlreadyOnBreak);
        }
        match self.reached_checkpoint(answered_count) {
            Some(idx) if idx >= self.breaks_taken.max(0) as usize => Ok(idx),
            _ => Err(BreakError::NotAtCheckpoint),
        }
    }

    /// Starts the break for the latest reached checkpoint. Skipped earlier breaks are forfeited.
    pub fn start_break(&mut self, answered_count: i32, now: DateTime<Utc>) -> Result<(), BreakError> {
        let idx = self.can_start_break(answered_count, now)?;
        self.end_break(now);
        self.breaks_taken = idx as i32 + 1;
        self.break_started_at = Some(now);
        Ok(())
    }

    /// Closes the open break, crediting at most the allowed break length.
    pub fn end_break(&mut self, now: DateTime<Utc>) {
        if self.break_started_at.is_some() {
            self.paused_seconds += self.open_break_credit(now);
            self.break_started_at = None;
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> ClockStatus {
        ClockStatus {
            remaining_seconds: self.remaining_seconds(now),
            expired: self.is_expired(now),
            on_break: self.on_break(now),
            break_remaining_seconds: self.break_remaining_seconds(now),
            breaks_taken: self.breaks_taken,
            next_break_at: self.next_break_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SIMULATION_DURATION_SECS;
    use chrono::Duration;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn full_exam() -> ExamClock {
        ExamClock::new(start(), SIMULATION_DURATION_SECS, 180)
    }

    #[test]
    fn fresh_clock_has_full_time() {
        let clock = full_exam();
        let status = clock.status(start());
        assert_eq!(status.remaining_seconds, SIMULATION_DURATION_SECS);
        assert!(!status.expired);
        assert_eq!(status.next_break_at, Some(60));
    }

    #[test]
    fn clock_never_goes_negative() {
        let clock = full_exam();
        let late = start() + Duration::hours(10);
        assert_eq!(clock.remaining_seconds(late), 0);
        assert!(clock.is_expired(late));
    }

    #[test]
    fn break_not_offered_before_checkpoint() {
        let clock = full_exam();
        let now = start() + Duration::minutes(30);
        assert_eq!(clock.can_start_break(59, now), Err(BreakError::NotAtCheckpoint));
    }

    #[test]
    fn break_pauses_the_exam_clock() {
        let mut clock = full_exam();
        let at_break = start() + Duration::minutes(70);
        clock.start_break(60, at_break).unwrap();
        assert!(clock.on_break(at_break + Duration::minutes(5)));

        let back = at_break + Duration::minutes(8);
        clock.end_break(back);
        assert_eq!(clock.paused_seconds, 8 * 60);
        assert_eq!(clock.active_elapsed_seconds(back), 70 * 60);
        assert_eq!(clock.next_break_at(), Some(120));
    }

    #[test]
    fn break_overrun_counts_as_exam_time() {
        let mut clock = full_exam();
        let at_break = start() + Duration::minutes(60);
        clock.start_break(61, at_break).unwrap();

        let back = at_break + Duration::minutes(15);
        assert!(!clock.on_break(back));
        assert_eq!(clock.active_elapsed_seconds(back), 65 * 60);
        clock.end_break(back);
        assert_eq!(clock.paused_seconds, BREAK_DURATION_SECS);
    }

    #[test]
    fn each_break_only_once() {
        let mut clock = full_exam();
        let t = start() + Duration::minutes(60);
        clock.start_break(60, t).unwrap();
        clock.end_break(t + Duration::minutes(10));
        assert_eq!(
            clock.can_start_break(65, t + Duration::minutes(11)),
            Err(BreakError::NotAtCheckpoint)
        );
        assert!(clock.can_start_break(120, t + Duration::minutes(90)).is_ok());
    }

    #[test]
    fn skipping_first_break_forfeits_it() {
        let mut clock = full_exam();
        let t = start() + Duration::minutes(150);
        clock.start_break(125, t).unwrap();
        assert_eq!(clock.breaks_taken, 2);
        assert_eq!(clock.next_break_at(), None);
    }

    #[test]
    fn second_break_while_on_break_is_rejected() {
        let mut clock = full_exam();
        let t = start() + Duration::minutes(60);
        clock.start_break(60, t).unwrap();
        assert_eq!(
            clock.can_start_break(120, t + Duration::minutes(1)),
            Err(BreakError::AlreadyOnBreak)
        );
    }

    #[test]
    fn short_runs_get_no_break() {
        let clock = ExamClock::new(start(), 3600, 50);
        assert_eq!(clock.next_break_at(), None);
        assert_eq!(
            clock.can_start_break(50, start() + Duration::minutes(5)),
            Err(BreakError::NotAtCheckpoint)
        );
    }

    #[test]
    fn expired_exam_has_no_break() {
        let clock = full_exam();
        let late = start() + Duration::seconds(SIMULATION_DURATION_SECS + 1);
        assert_eq!(clock.can_start_break(60, late), Err(BreakError::Expired));
    }
}
