//! Fade curves for music volume ramps
//!
//! Volume fades advance in periodic ticks; each tick maps the normalized
//! progress through the fade onto a gain with one of these curves.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve types
///
/// - Linear: constant rate of change (default)
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness while two decks overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "cosine", alias = "scurve")]
    SCurve,

    /// v(t) = sin(t × π/2)
    #[serde(alias = "equalpower")]
    EqualPower,
}

impl FadeCurve {
    /// Gain for a rising ramp at normalized position 0.0..=1.0
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Gain for a falling ramp at normalized position 0.0..=1.0
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Interpolate between two volumes along this curve
    ///
    /// Rising and falling ramps use the matching curve direction so that a
    /// duck and its restore sound symmetric.
    pub fn interpolate(&self, from: f32, to: f32, position: f32) -> f32 {
        if to >= from {
            from + (to - from) * self.calculate_fade_in(position)
        } else {
            to + (from - to) * self.calculate_fade_out(position)
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::EqualPower]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_bounds() {
        for curve in FadeCurve::all_variants() {
            assert!(curve.calculate_fade_in(0.0).abs() < 0.01, "{:?}", curve);
            assert!((curve.calculate_fade_in(1.0) - 1.0).abs() < 0.01, "{:?}", curve);
            assert!((curve.calculate_fade_out(0.0) - 1.0).abs() < 0.01, "{:?}", curve);
            assert!(curve.calculate_fade_out(1.0).abs() < 0.01, "{:?}", curve);
        }
    }

    #[test]
    fn test_linear_midpoint() {
        assert!((FadeCurve::Linear.calculate_fade_in(0.5) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_interpolate_duck_and_restore() {
        let curve = FadeCurve::Linear;
        // Duck from 1.0 to 0.2, halfway
        assert!((curve.interpolate(1.0, 0.2, 0.5) - 0.6).abs() < 0.001);
        // Restore from 0.2 to 1.0, halfway
        assert!((curve.interpolate(0.2, 1.0, 0.5) - 0.6).abs() < 0.001);
        // Ends hit targets exactly
        assert_eq!(curve.interpolate(0.0, 0.8, 1.0), 0.8);
        assert_eq!(curve.interpolate(0.8, 0.0, 1.0), 0.0);
    }

    #[derive(Deserialize)]
    struct Prefs {
        curve: FadeCurve,
    }

    #[test]
    fn test_preference_aliases() {
        let parse = |v: &str| toml::from_str::<Prefs>(&format!("curve = \"{}\"", v)).map(|p| p.curve);
        assert_eq!(parse("s_curve").unwrap(), FadeCurve::SCurve);
        assert_eq!(parse("cosine").unwrap(), FadeCurve::SCurve);
        assert_eq!(parse("equal_power").unwrap(), FadeCurve::EqualPower);
        assert!(parse("exponential").is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(FadeCurve::default(), FadeCurve::Linear);
    }
}
