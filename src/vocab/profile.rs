//! Aggressiveness profiles: the zone → multiplier curve

use serde::{Deserialize, Serialize};

/// A cubic parametric curve with two interior control points, evaluated at
/// a normalized position `x ∈ [0,1]` to yield an aggressiveness multiplier.
///
/// The curve is a cubic Bezier from `(0,0)` to `(1,1)` through
/// `(x1,y1)` and `(x2,y2)` — the same shape as a CSS `cubic-bezier()`
/// timing function, chosen because it gives a designer-tunable S-curve with
/// exactly four numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggressivenessProfile {
    pub name: String,
    pub is_builtin: bool,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl AggressivenessProfile {
    pub fn new(name: impl Into<String>, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            name: name.into(),
            is_builtin: false,
            x1: x1.clamp(0.0, 1.0),
            y1: y1.clamp(-2.0, 2.0),
            x2: x2.clamp(0.0, 1.0),
            y2: y2.clamp(-2.0, 2.0),
        }
    }

    pub fn builtin(name: impl Into<String>, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let mut p = Self::new(name, x1, y1, x2, y2);
        p.is_builtin = true;
        p
    }

    /// A gentle default curve: ramps up slowly then catches up near the end.
    pub fn balanced() -> Self {
        Self::builtin("balanced", 0.25, 0.1, 0.75, 0.9)
    }

    /// Evaluate the curve at normalized position `x`, clamped to `[0,1]`
    /// before evaluation. The control points are solved for `t` via the
    /// cubic Bezier x(t) by bisection (monotonic because `x1,x2 ∈ [0,1]`
    /// keeps the curve's x-component non-decreasing in the cases that
    /// matter for this domain), then `y(t)` is returned.
    pub fn evaluate(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        let t = Self::solve_t_for_x(x, self.x1, self.x2);
        bezier_component(t, 0.0, self.y1, self.y2, 1.0)
    }

    /// Bisection search for the parameter `t` such that `bezier_x(t) == x`.
    fn solve_t_for_x(x: f64, x1: f64, x2: f64) -> f64 {
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..40 {
            let mid = (lo + hi) / 2.0;
            let bx = bezier_component(mid, 0.0, x1, x2, 1.0);
            if bx < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (lo + hi) / 2.0
    }

    /// The four control points, in the order a round-trip serialization
    /// would carry them.
    pub fn control_points(&self) -> [(f64, f64); 4] {
        [(0.0, 0.0), (self.x1, self.y1), (self.x2, self.y2), (1.0, 1.0)]
    }
}

/// Evaluate a single cubic Bezier component at parameter `t`.
fn bezier_component(t: f64, p0: f64, p1: f64, p2: f64, p3: f64) -> f64 {
    let mt = 1.0 - t;
    mt.powi(3) * p0 + 3.0 * mt.powi(2) * t * p1 + 3.0 * mt * t.powi(2) * p2 + t.powi(3) * p3
}

/// The size-driven zone of the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Comfort,
    Watch,
    Emergency,
    Block,
}

impl Zone {
    pub fn classify(size: u64, min: u64, max: u64, emergency: u64) -> Zone {
        if size <= min {
            Zone::Comfort
        } else if size <= max {
            Zone::Watch
        } else if size <= emergency {
            Zone::Emergency
        } else {
            Zone::Block
        }
    }
}

/// Compute the normalized zone position `x = clamp((S - M) / (E - M), 0, 1)`
/// and the resulting aggressiveness multiplier `α = clamp(bezier(x), 0, 2)`
///.
pub fn aggressiveness(profile: &AggressivenessProfile, size: u64, min: u64, emergency: u64) -> f64 {
    let span = (emergency as f64 - min as f64).max(1e-9);
    let x = ((size as f64 - min as f64) / span).clamp(0.0, 1.0);
    profile.evaluate(x).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_map_to_zero_and_one() {
        let p = AggressivenessProfile::balanced();
        assert!(p.evaluate(0.0).abs() < 1e-6);
        assert!((p.evaluate(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn evaluate_is_monotonic_non_decreasing_for_balanced_profile() {
        let p = AggressivenessProfile::balanced();
        let mut prev = p.evaluate(0.0);
        for i in 1..=10 {
            let x = i as f64 / 10.0;
            let v = p.evaluate(x);
            assert!(v >= prev - 1e-6, "expected non-decreasing curve at x={x}");
            prev = v;
        }
    }

    #[test]
    fn control_points_round_trip_at_eleven_sample_points() {
        let p = AggressivenessProfile::new("custom", 0.2, -0.5, 0.8, 1.5);
        let [p0, p1, p2, p3] = p.control_points();
        let rebuilt = AggressivenessProfile::new("custom", p1.0, p1.1, p2.0, p2.1);
        assert_eq!(p0, (0.0, 0.0));
        assert_eq!(p3, (1.0, 1.0));
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert!((p.evaluate(x) - rebuilt.evaluate(x)).abs() < 1e-9);
        }
    }

    #[test]
    fn saturates_at_emergency_boundary() {
        let p = AggressivenessProfile::balanced();
        let alpha_at_emergency = aggressiveness(&p, 100, 30, 100);
        let alpha_beyond = aggressiveness(&p, 500, 30, 100);
        assert_eq!(alpha_at_emergency, alpha_beyond, "x clamps to 1.0 beyond emergency");
    }

    #[test]
    fn zone_boundaries_are_inclusive_on_the_lower_edge() {
        assert_eq!(Zone::classify(30, 30, 100, 150), Zone::Comfort);
        assert_eq!(Zone::classify(31, 30, 100, 150), Zone::Watch);
        assert_eq!(Zone::classify(100, 30, 100, 150), Zone::Watch);
        assert_eq!(Zone::classify(101, 30, 100, 150), Zone::Emergency);
        assert_eq!(Zone::classify(150, 30, 100, 150), Zone::Emergency);
        assert_eq!(Zone::classify(151, 30, 100, 150), Zone::Block);
    }
}
