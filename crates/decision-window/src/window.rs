//! Decision Window Implementation

use inference_engine::ClassificationResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Anything the window can rank by confidence
pub trait Scored {
    /// Confidence in `[0.0, 1.0]`
    fn confidence(&self) -> f64;
}

impl Scored for ClassificationResult {
    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in seconds (default: 10)
    pub duration_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

impl WindowConfig {
    /// Window length
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Emission produced when a non-empty window closes
#[derive(Debug, Clone)]
pub struct WindowFlush<T> {
    /// Highest-confidence candidate seen in the window
    pub best: T,
    /// When the window opened
    pub opened_at: Instant,
    /// When the window closed
    pub closed_at: Instant,
    /// Number of candidates observed in the window
    pub observed: usize,
}

/// Counters over the window's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    /// Windows that closed with a best candidate
    pub flushed: u64,
    /// Windows that closed with nothing observed
    pub empty: u64,
    /// Candidates observed across all windows
    pub observed: u64,
}

/// Rolling best-of window.
///
/// Always open; boundaries are checked cooperatively whenever the caller
/// observes a new candidate or polls. A candidate replaces the current best
/// only with strictly greater confidence, so the earliest candidate wins ties.
pub struct DecisionWindow<T> {
    duration: Duration,
    opened_at: Instant,
    best: Option<T>,
    observed: usize,
    stats: WindowStats,
}

impl<T: Scored> DecisionWindow<T> {
    /// Open the first window at `now`
    pub fn new(duration: Duration, now: Instant) -> Self {
        info!("Opening decision window: duration={:?}", duration);
        Self {
            duration,
            opened_at: now,
            best: None,
            observed: 0,
            stats: WindowStats::default(),
        }
    }

    /// Close the window if `now` is at or past its boundary.
    ///
    /// Returns the window's best candidate when it had one. Either way a
    /// closed window is reopened at `now` with no best.
    pub fn poll(&mut self, now: Instant) -> Option<WindowFlush<T>> {
        if now.saturating_duration_since(self.opened_at) < self.duration {
            return None;
        }

        let opened_at = std::mem::replace(&mut self.opened_at, now);
        let observed = std::mem::take(&mut self.observed);

        match self.best.take() {
            Some(best) => {
                self.stats.flushed += 1;
                debug!(
                    "Window closed: best confidence {:.2} of {} candidates",
                    best.confidence(),
                    observed
                );
                Some(WindowFlush {
                    best,
                    opened_at,
                    closed_at: now,
                    observed,
                })
            }
            None => {
                self.stats.empty += 1;
                debug!("Window closed empty, reopening");
                None
            }
        }
    }

    /// Offer a candidate to the open window without checking the boundary
    pub fn offer(&mut self, candidate: T) {
        self.observed += 1;
        self.stats.observed += 1;

        let replace = match &self.best {
            None => true,
            Some(best) => candidate.confidence() > best.confidence(),
        };
        if replace {
            self.best = Some(candidate);
        }
    }

    /// Check the boundary, then admit the candidate.
    ///
    /// A candidate arriving exactly at or past the boundary closes the old
    /// window and becomes the first candidate of the new one.
    pub fn observe(&mut self, candidate: T, now: Instant) -> Option<WindowFlush<T>> {
        let flush = self.poll(now);
        self.offer(candidate);
        flush
    }

    /// Current best candidate of the open window
    pub fn best(&self) -> Option<&T> {
        self.best.as_ref()
    }

    /// When the open window started
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Window length
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Lifetime counters
    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    /// Reopen the window at `now`, dropping any pending best.
    ///
    /// Lifetime counters are kept.
    pub fn restart(&mut self, now: Instant) -> Option<T> {
        self.opened_at = now;
        self.discard()
    }

    /// Drop the open window's best candidate, returning it
    pub fn discard(&mut self) -> Option<T> {
        self.observed = 0;
        self.best.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged {
        id: usize,
        confidence: f64,
    }

    impl Scored for Tagged {
        fn confidence(&self) -> f64 {
            self.confidence
        }
    }

    fn result(label: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            label: label.to_string(),
            label_index: 0,
            confidence,
            timestamp_ms: 0,
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_flush_emits_highest_confidence() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);

        assert!(window.observe(result("fuel_low", 0.62), t0 + secs(1)).is_none());
        assert!(window.observe(result("rpm_spike", 0.91), t0 + secs(4)).is_none());

        let flush = window.poll(t0 + secs(10)).unwrap();
        assert_eq!(flush.best.label, "rpm_spike");
        assert_eq!(flush.best.confidence, 0.91);
        assert_eq!(flush.observed, 2);
        assert!(window.best().is_none());
        assert_eq!(window.opened_at(), t0 + secs(10));
    }

    #[test]
    fn test_single_flush_per_window() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        window.offer(result("fuel_low", 0.7));

        assert!(window.poll(t0 + secs(10)).is_some());
        assert!(window.poll(t0 + secs(11)).is_none());
        assert_eq!(window.stats().flushed, 1);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        window.offer(result("fuel_low", 0.8));
        window.offer(result("rpm_spike", 0.8));

        assert_eq!(window.best().unwrap().label, "fuel_low");
    }

    #[test]
    fn test_empty_window_emits_nothing() {
        let t0 = Instant::now();
        let mut window: DecisionWindow<ClassificationResult> = DecisionWindow::new(secs(10), t0);

        assert!(window.poll(t0 + secs(10)).is_none());
        assert_eq!(window.stats().empty, 1);
        assert_eq!(window.opened_at(), t0 + secs(10));
    }

    #[test]
    fn test_boundary_candidate_opens_next_window() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        window.offer(result("fuel_low", 0.5));

        let flush = window.observe(result("speed_high", 0.99), t0 + secs(12)).unwrap();
        assert_eq!(flush.best.label, "fuel_low");
        assert_eq!(window.best().unwrap().label, "speed_high");
        assert_eq!(window.opened_at(), t0 + secs(12));
    }

    #[test]
    fn test_before_boundary_no_flush() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        window.offer(result("fuel_low", 0.5));

        assert!(window.poll(t0 + Duration::from_millis(9_999)).is_none());
        assert!(window.best().is_some());
    }

    #[test]
    fn test_discard_clears_best() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        window.offer(result("fuel_low", 0.5));

        assert_eq!(window.discard().unwrap().label, "fuel_low");
        assert!(window.poll(t0 + secs(10)).is_none());
    }

    #[test]
    fn test_restart_keeps_counters() {
        let t0 = Instant::now();
        let mut window = DecisionWindow::new(secs(10), t0);
        assert!(window.poll(t0 + secs(10)).is_none());
        window.offer(result("fuel_low", 0.5));

        let dropped = window.restart(t0 + secs(15));
        assert_eq!(dropped.unwrap().label, "fuel_low");
        assert_eq!(window.opened_at(), t0 + secs(15));
        assert_eq!(window.stats().empty, 1);
        assert_eq!(window.stats().observed, 1);
        assert!(window.poll(t0 + secs(24)).is_none());
        assert_eq!(window.stats().empty, 1);
    }

    proptest! {
        #[test]
        fn prop_flush_is_first_maximum(confidences in prop::collection::vec(0.0f64..=1.0, 1..64)) {
            let t0 = Instant::now();
            let mut window = DecisionWindow::new(secs(10), t0);

            for (id, &confidence) in confidences.iter().enumerate() {
                let at = t0 + Duration::from_millis(1 + id as u64);
                let emitted = window.observe(Tagged { id, confidence }, at);
                prop_assert!(emitted.is_none());
            }

            let flush = window.poll(t0 + secs(10)).unwrap();
            let max = confidences.iter().copied().fold(f64::MIN, f64::max);
            prop_assert_eq!(flush.best.confidence, max);
            prop_assert_eq!(flush.best.id, confidences.iter().position(|&c| c == max).unwrap());
            prop_assert_eq!(flush.observed, confidences.len());
        }
    }
}
