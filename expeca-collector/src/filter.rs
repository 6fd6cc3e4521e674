//! Recency window over parsed samples

use crate::parser::OffsetSample;
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    window: Duration,
}

impl RecencyWindow {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_secs(secs: u64) -> Self {
        // chrono caps durations at i64::MAX milliseconds
        Self::new(Duration::seconds(secs.min(i64::MAX as u64 / 1000) as i64))
    }

    pub fn duration(&self) -> Duration {
        self.window
    }

    /// `now - t < window`; a sample exactly `window` old is out
    pub fn contains(&self, now: NaiveDateTime, sample: &OffsetSample) -> bool {
        now - sample.timestamp < self.window
    }

    /// Offsets of the samples inside the window, order kept
    pub fn select(&self, now: NaiveDateTime, samples: &[OffsetSample]) -> Vec<i64> {
        samples
            .iter()
            .filter(|s| self.contains(now, s))
            .map(|s| s.offset_ns)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample(timestamp: NaiveDateTime, offset_ns: i64) -> OffsetSample {
        OffsetSample {
            timestamp,
            offset_ns,
        }
    }

    #[test]
    fn test_boundary_is_excluded() {
        let window = RecencyWindow::from_secs(365);
        let now = at(12, 6, 5);

        assert!(window.contains(now, &sample(at(12, 0, 1), 0)));
        // exactly 365 s old
        assert!(!window.contains(now, &sample(at(12, 0, 0), 0)));
        assert!(!window.contains(now, &sample(at(11, 0, 0), 0)));
    }

    #[test]
    fn test_future_samples_are_inside() {
        let window = RecencyWindow::from_secs(60);
        assert!(window.contains(at(12, 0, 0), &sample(at(12, 0, 30), 1)));
    }

    #[test]
    fn test_select_keeps_order() {
        let window = RecencyWindow::from_secs(60);
        let now = at(12, 0, 0);
        let samples = vec![
            sample(at(11, 58, 0), 1),
            sample(at(11, 59, 10), 30),
            sample(at(11, 0, 0), 2),
            sample(at(11, 59, 50), -4),
        ];

        assert_eq!(window.select(now, &samples), vec![30, -4]);
    }
}
