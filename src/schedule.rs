//! Per-kind run scheduling
//!
//! Each device kind carries one next-eligible-run timestamp, owned by the
//! poll loop and advanced by the fetch routines as their first action. A
//! kind with no recorded timestamp is due, so the first poll after startup
//! always fires.

use crate::store::DeviceKind;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Next-eligible-run timestamps, one entry per device kind
#[derive(Debug, Default)]
pub struct ScheduleBoard {
    next_run: HashMap<DeviceKind, NaiveDateTime>,
}

impl ScheduleBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a kind is eligible to run at `now`
    pub fn is_due(&self, kind: DeviceKind, now: NaiveDateTime) -> bool {
        match self.next_run.get(&kind) {
            Some(at) => now >= *at,
            None => true,
        }
    }

    /// Record the next run moment for a kind
    pub fn advance(&mut self, kind: DeviceKind, at: NaiveDateTime) {
        self.next_run.insert(kind, at);
    }

    /// The currently scheduled next run, if any was recorded yet
    pub fn next_run(&self, kind: DeviceKind) -> Option<NaiveDateTime> {
        self.next_run.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 4, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn fresh_board_is_due_for_every_kind() {
        let board = ScheduleBoard::new();
        for kind in [
            DeviceKind::Weather,
            DeviceKind::Precipitation,
            DeviceKind::UvNow,
            DeviceKind::UvForecast,
            DeviceKind::Moon,
        ] {
            assert!(board.is_due(kind, at(0, 0)));
        }
    }

    #[test]
    fn advancing_suppresses_until_the_moment_passes() {
        let mut board = ScheduleBoard::new();
        let now = at(12, 0);
        board.advance(DeviceKind::Weather, now + Duration::minutes(10));

        assert!(!board.is_due(DeviceKind::Weather, now));
        assert!(!board.is_due(DeviceKind::Weather, now + Duration::minutes(9)));
        assert!(board.is_due(DeviceKind::Weather, now + Duration::minutes(10)));

        // Other kinds are unaffected
        assert!(board.is_due(DeviceKind::Moon, now));
    }

    #[test]
    fn next_run_reports_last_advance() {
        let mut board = ScheduleBoard::new();
        assert_eq!(board.next_run(DeviceKind::UvNow), None);
        board.advance(DeviceKind::UvNow, at(13, 30));
        board.advance(DeviceKind::UvNow, at(14, 0));
        assert_eq!(board.next_run(DeviceKind::UvNow), Some(at(14, 0)));
    }
}
