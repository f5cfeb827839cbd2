//! Wall clock abstraction.
//!
//! Token freshness is measured as `now - transaction_timestamp` on the local
//! wall clock, with both sides naive (no zone). Injecting the clock lets
//! tests move time without sleeping.

use chrono::{Duration, Local, NaiveDateTime};
use parking_lot::Mutex;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The local system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Whole minutes elapsed from `from` to `to`, truncated toward zero.
///
/// A timestamp in the future yields a negative count, which is always
/// inside the window.
pub fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (to - from).num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(at(10, 0, 0));
        assert_eq!(clock.now(), at(10, 0, 0));
        clock.advance(Duration::minutes(20));
        assert_eq!(clock.now(), at(10, 20, 0));
        clock.set(at(9, 0, 0));
        assert_eq!(clock.now(), at(9, 0, 0));
    }

    #[test]
    fn minutes_are_truncated() {
        assert_eq!(minutes_between(at(10, 0, 0), at(10, 14, 59)), 14);
        assert_eq!(minutes_between(at(10, 0, 0), at(10, 15, 0)), 15);
        assert_eq!(minutes_between(at(10, 5, 0), at(10, 0, 0)), -5);
    }

    #[test]
    fn system_clock_is_close_to_local_now() {
        let before = Local::now().naive_local();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
