//! Parsing of ffmpeg's `-progress` key=value stream.

use std::time::{Duration, Instant};

/// One parsed progress-stream field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSample {
    /// Presented-time position within the source media.
    Time(Duration),
    /// Throughput indicator as reported, e.g. `1.52x`.
    Speed(String),
}

impl ProgressSample {
    /// Parses a single progress line. Unknown keys and `N/A` values yield `None`.
    ///
    /// Both `out_time_ms` and `out_time_us` carry microseconds.
    pub fn parse(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            "out_time_us" | "out_time_ms" => value
                .parse::<u64>()
                .ok()
                .map(|us| Self::Time(Duration::from_micros(us))),
            "speed" if !value.is_empty() && value != "N/A" => Some(Self::Speed(value.to_string())),
            _ => None,
        }
    }
}

/// Progress published to the job owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percentage: u8,
    /// Wall-clock time since the process started.
    pub elapsed: Duration,
    /// Remaining wall-clock estimate; known once `percentage > 0`.
    pub estimated_remaining: Option<Duration>,
    pub speed: Option<String>,
}

impl ProgressUpdate {
    /// Elapsed plus remaining, when an estimate exists.
    pub fn estimated_total(&self) -> Option<Duration> {
        self.estimated_remaining.map(|r| self.elapsed + r)
    }
}

/// `floor(elapsed * 100 / total)` clamped to 0..=100; `None` without a usable total.
pub fn percentage(media_time: Duration, total_secs: f64) -> Option<u8> {
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return None;
    }
    let pct = (media_time.as_secs_f64() * 100.0 / total_secs).floor();
    Some(pct.clamp(0.0, 100.0) as u8)
}

/// Remaining wall-clock estimate: `elapsed * (100 - pct) / pct`.
pub fn estimate_remaining(elapsed: Duration, percentage: u8) -> Option<Duration> {
    if percentage == 0 {
        return None;
    }
    let pct = u32::from(percentage.min(100));
    Some(elapsed * (100 - pct) / pct)
}

/// Folds progress lines into updates for one process invocation.
#[derive(Debug)]
pub struct ProgressTracker {
    total_secs: f64,
    started: Instant,
    speed: Option<String>,
    last_percentage: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total_secs: f64) -> Self {
        Self::starting_at(total_secs, Instant::now())
    }

    pub fn starting_at(total_secs: f64, started: Instant) -> Self {
        Self {
            total_secs,
            started,
            speed: None,
            last_percentage: None,
        }
    }

    /// Feeds one line; returns an update when the percentage moved.
    pub fn observe(&mut self, line: &str) -> Option<ProgressUpdate> {
        match ProgressSample::parse(line)? {
            ProgressSample::Speed(speed) => {
                tracing::debug!(speed = %speed, "Processing speed");
                self.speed = Some(speed);
                None
            }
            ProgressSample::Time(media_time) => {
                let pct = percentage(media_time, self.total_secs)?;
                if self.last_percentage == Some(pct) {
                    return None;
                }
                self.last_percentage = Some(pct);

                let elapsed = self.started.elapsed();
                Some(ProgressUpdate {
                    percentage: pct,
                    elapsed,
                    estimated_remaining: estimate_remaining(elapsed, pct),
                    speed: self.speed.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_markers() {
        assert_eq!(
            ProgressSample::parse("out_time_ms=60000000"),
            Some(ProgressSample::Time(Duration::from_secs(60)))
        );
        assert_eq!(
            ProgressSample::parse("out_time_us=1500000"),
            Some(ProgressSample::Time(Duration::from_millis(1500)))
        );
        assert_eq!(ProgressSample::parse("out_time_us=N/A"), None);
        // The HH:MM:SS form repeats the same position; only microseconds are read.
        assert_eq!(ProgressSample::parse("out_time=00:01:00.000000"), None);
    }

    #[test]
    fn test_parse_speed_and_other_keys() {
        assert_eq!(
            ProgressSample::parse("speed=1.52x"),
            Some(ProgressSample::Speed("1.52x".to_string()))
        );
        assert_eq!(ProgressSample::parse("speed=N/A"), None);
        assert_eq!(ProgressSample::parse("frame=120"), None);
        assert_eq!(ProgressSample::parse("progress=end"), None);
        assert_eq!(ProgressSample::parse("garbage"), None);
    }

    #[test]
    fn test_percentage_half_way() {
        assert_eq!(percentage(Duration::from_micros(60_000_000), 120.0), Some(50));
    }

    #[test]
    fn test_percentage_floors_and_clamps() {
        assert_eq!(percentage(Duration::from_millis(1999), 200.0), Some(0));
        assert_eq!(percentage(Duration::from_secs(119), 120.0), Some(99));
        assert_eq!(percentage(Duration::from_secs(130), 120.0), Some(100));
        assert_eq!(percentage(Duration::from_secs(10), 0.0), None);
        assert_eq!(percentage(Duration::from_secs(10), f64::NAN), None);
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Duration::from_secs(30), 0), None);
        assert_eq!(
            estimate_remaining(Duration::from_secs(30), 25),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            estimate_remaining(Duration::from_secs(30), 100),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_tracker_emits_on_change_only() {
        let mut tracker = ProgressTracker::new(100.0);
        assert!(tracker.observe("speed=2.0x").is_none());

        let first = tracker.observe("out_time_ms=10000000").unwrap();
        assert_eq!(first.percentage, 10);
        assert_eq!(first.speed.as_deref(), Some("2.0x"));
        assert!(first.estimated_remaining.is_some());

        assert!(tracker.observe("out_time_ms=10500000").is_none());
        assert_eq!(tracker.observe("out_time_ms=20000000").unwrap().percentage, 20);
    }

    #[test]
    fn test_tracker_without_duration_is_silent() {
        let mut tracker = ProgressTracker::new(0.0);
        assert!(tracker.observe("out_time_ms=10000000").is_none());
    }
}
