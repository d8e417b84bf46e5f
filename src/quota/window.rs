//! Fixed windows anchored to wall-clock boundaries.

use std::time::Duration;

use chrono::{NaiveTime, Timelike};

const SECONDS_PER_DAY: u32 = 86_400;

/// A fixed counting window aligned to the wall clock.
///
/// Windows start at multiples of their length counted from midnight, so a
/// 60 second window always resets at `:00` of every minute, whichever key or
/// client is involved. If the length does not divide a day evenly, the last
/// window before midnight is cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    seconds: u32,
}

impl Window {
    /// One wall-clock minute.
    pub const MINUTE: Window = Window { seconds: 60 };

    /// Create a window of `seconds`, clamped to `1..=86400`.
    pub fn from_secs(seconds: u32) -> Self {
        Self {
            seconds: seconds.clamp(1, SECONDS_PER_DAY),
        }
    }

    /// Get the duration of this window.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds as u64)
    }

    /// Seconds of the current window that have already passed at `now`.
    pub fn elapsed(&self, now: NaiveTime) -> Duration {
        Duration::from_secs((now.num_seconds_from_midnight() % self.seconds) as u64)
    }

    /// Time left until the next window boundary. Always within
    /// `1..=window` seconds; for a minute window this is `60 - second`.
    pub fn remaining(&self, now: NaiveTime) -> Duration {
        let since_midnight = now.num_seconds_from_midnight();
        let elapsed = since_midnight % self.seconds;
        let until_midnight = SECONDS_PER_DAY - since_midnight;
        Duration::from_secs((self.seconds - elapsed).min(until_midnight) as u64)
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::MINUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_minute_remaining() {
        let window = Window::MINUTE;
        assert_eq!(window.remaining(at(10, 15, 0)), Duration::from_secs(60));
        assert_eq!(window.remaining(at(10, 15, 1)), Duration::from_secs(59));
        assert_eq!(window.remaining(at(10, 15, 58)), Duration::from_secs(2));
        assert_eq!(window.remaining(at(10, 15, 59)), Duration::from_secs(1));
    }

    #[test]
    fn test_sub_second_precision_is_ignored() {
        let now = NaiveTime::from_hms_milli_opt(10, 15, 30, 999).unwrap();
        assert_eq!(Window::MINUTE.remaining(now), Duration::from_secs(30));
        assert_eq!(Window::MINUTE.elapsed(now), Duration::from_secs(30));
    }

    #[test]
    fn test_leap_second_stays_in_window() {
        // chrono encodes a leap second as second 59 with nanos >= 1e9.
        let now = NaiveTime::from_hms_milli_opt(23, 59, 59, 1500).unwrap();
        assert_eq!(Window::MINUTE.remaining(now), Duration::from_secs(1));
    }

    #[test]
    fn test_longer_windows_anchor_to_midnight() {
        let quarter = Window::from_secs(900);
        assert_eq!(quarter.remaining(at(9, 0, 0)), Duration::from_secs(900));
        assert_eq!(quarter.remaining(at(9, 14, 30)), Duration::from_secs(30));
        assert_eq!(quarter.elapsed(at(9, 16, 0)), Duration::from_secs(60));
    }

    #[test]
    fn test_uneven_window_is_cut_at_midnight() {
        let window = Window::from_secs(7 * 3600);
        // 21:00 starts the fourth window, which would run to 04:00.
        assert_eq!(window.remaining(at(23, 0, 0)), Duration::from_secs(3600));
    }

    #[test]
    fn test_from_secs_clamps() {
        assert_eq!(Window::from_secs(0).duration(), Duration::from_secs(1));
        assert_eq!(Window::from_secs(100_000).duration(), Duration::from_secs(86_400));
        assert_eq!(Window::default(), Window::MINUTE);
    }
}
