//! Legend sets: value thresholds with colors, used for the gauge fill.

use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub start_value: f64,
    pub end_value: f64,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegendSet {
    #[serde(default)]
    pub legends: Vec<LegendEntry>,
}

impl LegendSet {
    pub fn from_value(value: &Value) -> Option<LegendSet> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Entries ordered by start value, so interval lookup scans low to high.
    pub fn sorted(mut self) -> Self {
        self.legends.sort_by(|a, b| {
            a.start_value
                .partial_cmp(&b.start_value)
                .unwrap_or(Ordering::Equal)
        });
        self
    }

    /// The color of the interval containing `value`. Intervals are
    /// half-open: `start <= value < end`.
    pub fn color_by_value(&self, value: f64) -> Option<&str> {
        self.legends
            .iter()
            .find(|l| l.start_value <= value && value < l.end_value)
            .map(|l| l.color.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set() -> LegendSet {
        LegendSet::from_value(&json!({
            "legends": [
                {"name": "High", "startValue": 70, "endValue": 100, "color": "#00ff00"},
                {"name": "Low", "startValue": 0, "endValue": 40, "color": "#ff0000"},
                {"name": "Medium", "startValue": 40, "endValue": 70, "color": "#ffff00"},
            ],
        }))
        .unwrap()
        .sorted()
    }

    #[test]
    fn entries_sort_by_start_value() {
        let s = set();
        assert_eq!(s.legends[0].name.as_deref(), Some("Low"));
        assert_eq!(s.legends[2].name.as_deref(), Some("High"));
    }

    #[test]
    fn interval_lookup_is_half_open() {
        let s = set();
        assert_eq!(s.color_by_value(0.0), Some("#ff0000"));
        assert_eq!(s.color_by_value(39.9), Some("#ff0000"));
        assert_eq!(s.color_by_value(40.0), Some("#ffff00"));
        assert_eq!(s.color_by_value(100.0), None);
        assert_eq!(s.color_by_value(-1.0), None);
    }
}
