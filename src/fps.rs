use std::time::Instant;

/// Frame counter with wall-clock timing
#[derive(Debug, Default)]
pub struct FpsCounter {
    start: Option<Instant>,
    end: Option<Instant>,
    frames: u64,
}

impl FpsCounter {
    pub fn start() -> Self {
        Self {
            start: Some(Instant::now()),
            end: None,
            frames: 0,
        }
    }

    pub fn update(&mut self) {
        self.frames += 1;
    }

    pub fn stop(&mut self) {
        self.end = Some(Instant::now());
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Seconds between start and stop, or until now while running
    pub fn elapsed(&self) -> f64 {
        let Some(start) = self.start else {
            return 0.;
        };
        let end = self.end.unwrap_or_else(Instant::now);
        end.saturating_duration_since(start).as_secs_f64()
    }

    pub fn fps(&self) -> f64 {
        rate(self.frames, self.elapsed())
    }

    #[cfg(test)]
    fn with_elapsed(frames: u64, elapsed: std::time::Duration) -> Self {
        let start = Instant::now();
        Self {
            start: Some(start),
            end: Some(start + elapsed),
            frames,
        }
    }
}

fn rate(frames: u64, elapsed: f64) -> f64 {
    if elapsed > 0. {
        frames as f64 / elapsed
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fps() {
        let counter = FpsCounter::with_elapsed(30, Duration::from_secs(2));
        assert!((counter.elapsed() - 2.).abs() < 1e-9);
        assert!((counter.fps() - 15.).abs() < 1e-9);
    }

    #[test]
    fn test_update_counts_frames() {
        let mut counter = FpsCounter::start();
        counter.update();
        counter.update();
        counter.stop();
        assert_eq!(counter.frames(), 2);
        let stopped = counter.elapsed();
        assert_eq!(counter.elapsed(), stopped);
    }

    #[test]
    fn test_not_started() {
        let counter = FpsCounter::default();
        assert_eq!(counter.elapsed(), 0.);
        assert_eq!(counter.fps(), 0.);
    }
}
