/// Snapshot of one detected object in the current frame
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub label: String,
    /// pixel area of the bounding box
    pub size: i64,
    pub center_x: i32,
    pub center_y: i32,
    /// depth reading at the center, smaller is closer
    pub distance: i32,
}

impl Obstacle {
    pub fn new(label: &str, size: i64, center_x: i32, center_y: i32, distance: i32) -> Self {
        Self {
            label: label.to_owned(),
            size,
            center_x,
            center_y,
            distance,
        }
    }

    /// Placeholder held before anything has been detected.
    /// The negative distance keeps its threat level at zero.
    pub fn none() -> Self {
        Self::new("none", 0, 0, 0, -5)
    }

    /// size / (distance + 1), never stored so it always follows the fields
    pub fn threat_level(&self) -> f64 {
        debug_assert!(self.distance != -1, "distance of -1 has no threat level");
        self.size as f64 / (self.distance as f64 + 1.)
    }
}

/// Keeps the most threatening obstacle seen during the session
#[derive(Debug)]
pub struct ObstacleTracker {
    current: Obstacle,
}

impl Default for ObstacleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ObstacleTracker {
    pub fn new() -> Self {
        Self::starting_from(Obstacle::none())
    }

    pub fn starting_from(current: Obstacle) -> Self {
        Self { current }
    }

    pub fn current(&self) -> &Obstacle {
        &self.current
    }

    pub fn threat_level(&self) -> f64 {
        self.current.threat_level()
    }

    /// Replace the tracked obstacle if the candidate is strictly more threatening.
    /// Returns true when the tracking target changed.
    pub fn evaluate(&mut self, candidate: Obstacle) -> bool {
        if candidate.threat_level() > self.threat_level() {
            self.current = candidate;
            true
        } else {
            false
        }
    }
}
