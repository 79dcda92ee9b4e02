use serde::{Deserialize, Serialize};

/// Elapsed/total for the live track, in seconds. `total_seconds` is 0 until
/// the engine reports a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
}

impl Progress {
    pub fn duration_known(&self) -> bool {
        self.total_seconds.is_finite() && self.total_seconds > 0.0
    }

    /// Set elapsed, clamped to `[0, total]` once the total is known.
    pub fn set_elapsed(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.elapsed_seconds = if self.duration_known() {
            seconds.min(self.total_seconds)
        } else {
            seconds
        };
    }

    pub fn set_total(&mut self, seconds: f64) {
        self.total_seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };
        let elapsed = self.elapsed_seconds;
        self.set_elapsed(elapsed);
    }

    /// 0-100, or 0 while the duration is unknown.
    pub fn percent(&self) -> f64 {
        if self.duration_known() {
            self.elapsed_seconds / self.total_seconds * 100.0
        } else {
            0.0
        }
    }

    pub fn elapsed_label(&self) -> String {
        format_time(self.elapsed_seconds)
    }

    pub fn total_label(&self) -> String {
        format_time(self.total_seconds)
    }
}

/// Always `M:SS`; minutes are not rolled into hours.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.9), "0:09");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(4500.0), "75:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_elapsed_is_clamped_once_total_known() {
        let mut progress = Progress::default();
        progress.set_elapsed(500.0);
        assert_eq!(progress.elapsed_seconds, 500.0);

        progress.set_total(200.0);
        assert_eq!(progress.elapsed_seconds, 200.0);

        progress.set_elapsed(-4.0);
        assert_eq!(progress.elapsed_seconds, 0.0);

        progress.set_elapsed(50.0);
        assert_eq!(progress.percent(), 25.0);
        assert_eq!(progress.elapsed_label(), "0:50");
        assert_eq!(progress.total_label(), "3:20");
    }

    #[test]
    fn test_unknown_total() {
        let mut progress = Progress::default();
        progress.set_total(f64::NAN);
        assert!(!progress.duration_known());
        assert_eq!(progress.percent(), 0.0);
    }
}
