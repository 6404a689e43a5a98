//! Similarity score presentation.
//!
//! Tiers compare the unrounded percentage against fixed thresholds. Only the
//! printed value is rounded to hundredths of a percent.

use serde::Serialize;

/// Above this percentage a candidate is a likely match.
pub const HIGH_THRESHOLD: f64 = 65.0;
pub const MID_THRESHOLD: f64 = 50.0;
pub const LOW_THRESHOLD: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    High,
    Mid,
    Low,
    Default,
}

impl ScoreTier {
    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::High => "high confidence",
            ScoreTier::Mid => "borderline",
            ScoreTier::Low => "low",
            ScoreTier::Default => "unlikely",
        }
    }
}

/// Score as a percentage in [0, 100]. Non-finite scores count as 0.
pub fn percentage(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 1.0) * 100.0
}

/// Score in hundredths of a percent, clamped to [0, 10000]. Non-finite scores count as 0.
pub fn basis_points(score: f64) -> u32 {
    if !score.is_finite() {
        return 0;
    }
    (score.clamp(0.0, 1.0) * 10_000.0).round() as u32
}

/// Render a score as a percentage with two decimals, e.g. `0.6532` → `"65.32%"`.
pub fn format_score(score: f64) -> String {
    let bp = basis_points(score);
    format!("{}.{:02}%", bp / 100, bp % 100)
}

pub fn tier(score: f64) -> ScoreTier {
    let pct = percentage(score);
    if pct > HIGH_THRESHOLD {
        ScoreTier::High
    } else if pct > MID_THRESHOLD {
        ScoreTier::Mid
    } else if pct > LOW_THRESHOLD {
        ScoreTier::Low
    } else {
        ScoreTier::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_score(0.6532), "65.32%");
        assert_eq!(format_score(0.6532), format_score(0.6532));
        assert_eq!(format_score(0.42), "42.00%");
        assert_eq!(format_score(0.0), "0.00%");
        assert_eq!(format_score(1.0), "100.00%");
        assert_eq!(format_score(0.05), "5.00%");
    }

    #[test]
    fn formatting_clamps_out_of_range_values() {
        assert_eq!(format_score(-0.3), "0.00%");
        assert_eq!(format_score(1.7), "100.00%");
        assert_eq!(format_score(f64::NAN), "0.00%");
    }

    #[test]
    fn tiers_match_reference_points() {
        assert_eq!(tier(0.70), ScoreTier::High);
        assert_eq!(tier(0.55), ScoreTier::Mid);
        assert_eq!(tier(0.47), ScoreTier::Low);
        assert_eq!(tier(0.10), ScoreTier::Default);
    }

    #[test]
    fn tier_boundaries_are_exclusive() {
        assert_eq!(tier(0.6501), ScoreTier::High);
        assert_eq!(tier(0.6499), ScoreTier::Mid);

        assert_eq!(tier(0.5001), ScoreTier::Mid);
        assert_eq!(tier(0.50), ScoreTier::Low);
        assert_eq!(tier(0.4999), ScoreTier::Low);

        assert_eq!(tier(0.4501), ScoreTier::Low);
        assert_eq!(tier(0.4499), ScoreTier::Default);
        assert_eq!(tier(f64::NAN), ScoreTier::Default);
    }

    #[test]
    fn tier_uses_unrounded_score() {
        assert_eq!(format_score(0.65004), "65.00%");
        assert_eq!(tier(0.65004), ScoreTier::High);
        assert_eq!(format_score(0.50004), "50.00%");
        assert_eq!(tier(0.50004), ScoreTier::Mid);
        assert_eq!(format_score(0.45004), "45.00%");
        assert_eq!(tier(0.45004), ScoreTier::Low);
    }

    #[test]
    fn float_products_decide_exact_thresholds() {
        // 0.65 * 100 and 0.45 * 100 land just above the threshold in binary
        // floating point; 0.5 * 100 is exact.
        assert_eq!(tier(0.65), ScoreTier::High);
        assert_eq!(tier(0.50), ScoreTier::Low);
        assert_eq!(tier(0.45), ScoreTier::Low);
    }
}
