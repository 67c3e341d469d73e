//! Detection result ingestion: turning the service's loosely shaped answer
//! into stored records and a stable JSON contract.

pub mod normalize;
pub mod view;

pub use normalize::{normalize, Defect, DetectionOutcome};
pub use view::{BoxView, DefectView, SummaryView};

/// Threshold from the form field; unusable values fall back to `default`.
pub fn parse_threshold(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t > 0.0 && *t <= 1.0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold(Some("0.25"), 0.5), 0.25);
        assert_eq!(parse_threshold(Some(" 1 "), 0.5), 1.0);
        assert_eq!(parse_threshold(Some("0"), 0.5), 0.5);
        assert_eq!(parse_threshold(Some("1.5"), 0.5), 0.5);
        assert_eq!(parse_threshold(Some("-0.2"), 0.5), 0.5);
        assert_eq!(parse_threshold(Some("NaN"), 0.5), 0.5);
        assert_eq!(parse_threshold(Some("high"), 0.5), 0.5);
        assert_eq!(parse_threshold(None, 0.4), 0.4);
    }
}
