//! Layout: the validated form of a declarative chart configuration.
//!
//! Configurations arrive as loosely-typed JSON. Validation is two-tier:
//! malformed fragments (a dimension without an id, an item that is not an
//! object) are dropped with a warning, while business-rule violations
//! (no series, no period anywhere, contradictory data selections) fail the
//! whole layout with a user-facing message.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dimension::{self, DimensionRegistry};
use crate::error::{Error, Result};

/// A selected item inside a dimension. The name is optional client-side and
/// back-filled from response metadata later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// A dimension placed on an axis: its object name plus selected items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub dimension: String,
    #[serde(default)]
    pub items: Vec<Record>,
}

impl Dimension {
    pub fn new(dimension: impl Into<String>, items: Vec<Record>) -> Self {
        Self {
            dimension: dimension.into(),
            items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Column,
    StackedColumn,
    Bar,
    StackedBar,
    Line,
    Area,
    Pie,
    Radar,
    Gauge,
}

impl ChartKind {
    /// Accepts both the client spelling (`stackedcolumn`) and the server enum
    /// spelling (`STACKED_COLUMN`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "column" | "COLUMN" => Some(Self::Column),
            "stackedcolumn" | "STACKED_COLUMN" => Some(Self::StackedColumn),
            "bar" | "BAR" => Some(Self::Bar),
            "stackedbar" | "STACKED_BAR" => Some(Self::StackedBar),
            "line" | "LINE" => Some(Self::Line),
            "area" | "AREA" => Some(Self::Area),
            "pie" | "PIE" => Some(Self::Pie),
            "radar" | "RADAR" => Some(Self::Radar),
            "gauge" | "GAUGE" => Some(Self::Gauge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::StackedColumn => "stackedcolumn",
            Self::Bar => "bar",
            Self::StackedBar => "stackedbar",
            Self::Line => "line",
            Self::Area => "area",
            Self::Pie => "pie",
            Self::Radar => "radar",
            Self::Gauge => "gauge",
        }
    }

    /// Kinds whose series accumulate into per-category totals.
    pub fn is_stacked(self) -> bool {
        matches!(self, Self::StackedColumn | Self::StackedBar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationType {
    #[default]
    Default,
    Count,
    Sum,
    Stddev,
    Variance,
    Min,
    Max,
}

impl AggregationType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEFAULT" => Some(Self::Default),
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "STDDEV" => Some(Self::Stddev),
            "VARIANCE" => Some(Self::Variance),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Stddev => "STDDEV",
            Self::Variance => "VARIANCE",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Which metadata name variant requests ask the server to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayProperty {
    #[default]
    Name,
    ShortName,
}

impl DisplayProperty {
    /// Both the plain and the `display`-prefixed spellings are in circulation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" | "displayName" => Some(Self::Name),
            "shortName" | "displayShortName" => Some(Self::ShortName),
            _ => None,
        }
    }

    /// Uppercase form used as a request parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::ShortName => "SHORTNAME",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AxisStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_font: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegendStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_font: Option<String>,
}

/// A number that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A string or an array of strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// The loosely-typed configuration as received. Unknown fields are ignored;
/// legacy field spellings are kept alongside their successors so precedence
/// can be applied during validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub columns: Vec<Value>,
    pub rows: Vec<Value>,
    pub filters: Vec<Value>,

    pub show_values: Option<bool>,
    /// Legacy spelling of `show_values`.
    pub show_data: Option<bool>,
    pub hide_empty_rows: Option<bool>,
    pub show_trend_line: Option<bool>,
    /// Legacy spelling of `show_trend_line`.
    pub regression: Option<bool>,
    pub completed_only: Option<bool>,

    pub target_line_value: Option<LooseNumber>,
    pub target_line_title: Option<String>,
    pub target_line_label: Option<String>,
    pub base_line_value: Option<LooseNumber>,
    pub base_line_title: Option<String>,
    pub base_line_label: Option<String>,

    pub sort_order: Option<i32>,
    pub aggregation_type: Option<String>,

    pub range_axis_max_value: Option<f64>,
    pub range_axis_min_value: Option<f64>,
    pub range_axis_steps: Option<u32>,
    pub range_axis_decimals: Option<u32>,
    pub range_axis_title: Option<String>,
    pub range_axis_label: Option<String>,
    pub domain_axis_title: Option<String>,
    pub domain_axis_label: Option<String>,

    pub hide_legend: Option<bool>,
    pub hide_title: Option<bool>,
    pub title: Option<String>,

    pub display_property: Option<String>,
    pub user_org_unit: Option<OneOrMany>,
    pub relative_period_date: Option<String>,

    pub domain_axis_style: Option<AxisStyle>,
    pub range_axis_style: Option<AxisStyle>,
    pub legend_style: Option<LegendStyle>,
    pub series_style: Option<SeriesStyle>,

    pub id: Option<String>,
    pub name: Option<String>,
}

/// A fully validated layout. Every field is populated; rendering never has to
/// consult the raw configuration again.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub kind: ChartKind,
    pub columns: Vec<Dimension>,
    pub rows: Vec<Dimension>,
    pub filters: Vec<Dimension>,

    pub show_values: bool,
    pub hide_empty_rows: bool,
    pub show_trend_line: bool,
    pub completed_only: bool,

    pub target_line_value: Option<f64>,
    pub target_line_title: Option<String>,
    pub base_line_value: Option<f64>,
    pub base_line_title: Option<String>,

    pub sort_order: i32,
    pub aggregation_type: AggregationType,

    pub range_axis_max_value: Option<f64>,
    pub range_axis_min_value: Option<f64>,
    pub range_axis_steps: Option<u32>,
    pub range_axis_decimals: Option<u32>,
    pub range_axis_title: Option<String>,
    pub domain_axis_title: Option<String>,

    pub hide_legend: bool,
    pub hide_title: bool,
    pub title: Option<String>,

    pub display_property: DisplayProperty,
    pub user_org_unit: Vec<String>,
    pub relative_period_date: Option<String>,

    pub domain_axis_style: Option<AxisStyle>,
    pub range_axis_style: Option<AxisStyle>,
    pub legend_style: Option<LegendStyle>,
    pub series_style: Option<SeriesStyle>,

    pub id: Option<String>,
    pub name: Option<String>,
}

/// Validates a raw item. Anything without a non-empty string id is dropped.
fn valid_record(value: &Value) -> Option<Record> {
    let obj = value.as_object()?;
    let id = obj.get("id")?.as_str()?;
    if id.is_empty() {
        return None;
    }
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_owned);
    Some(Record {
        id: id.to_owned(),
        name,
    })
}

/// Validates a raw dimension entry. Items are required non-empty except for
/// the category dimension, whose disaggregations are implied server-side.
fn valid_dimension(value: &Value, registry: &DimensionRegistry) -> Option<Dimension> {
    let obj = value.as_object()?;
    let name = obj.get("dimension")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    if registry.get(name).is_none() {
        warn!(dimension = name, "dropping unknown dimension");
        return None;
    }

    let items: Vec<Record> = obj
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(valid_record).collect())
        .unwrap_or_default();

    if items.is_empty() && name != dimension::CATEGORY {
        warn!(dimension = name, "dropping dimension without valid items");
        return None;
    }

    Some(Dimension::new(name, items))
}

fn valid_axis(values: &[Value], registry: &DimensionRegistry) -> Vec<Dimension> {
    values
        .iter()
        .filter_map(|v| valid_dimension(v, registry))
        .collect()
}

fn has_dimension(dims: &[Dimension], name: &str) -> bool {
    dims.iter().any(|d| d.dimension == name)
}

/// Business rules over the validated axes. Shared between initial validation
/// and the re-validation run after server synchronization.
pub(crate) fn check_rules(
    columns: &[Dimension],
    rows: &[Dimension],
    filters: &[Dimension],
    aggregation_type: AggregationType,
) -> Result<()> {
    if columns.is_empty() {
        return Err(Error::validation("No series items selected"));
    }
    if rows.is_empty() {
        return Err(Error::validation("No category items selected"));
    }

    let everywhere = |name: &str| {
        has_dimension(columns, name) || has_dimension(rows, name) || has_dimension(filters, name)
    };

    if !everywhere(dimension::PERIOD) {
        return Err(Error::validation(
            "At least one period must be specified as series, category or filter",
        ));
    }

    if has_dimension(filters, dimension::INDICATOR) {
        return Err(Error::validation("Indicators cannot be specified as filter"));
    }
    if has_dimension(filters, dimension::CATEGORY) {
        return Err(Error::validation("Categories cannot be specified as filter"));
    }
    if has_dimension(filters, dimension::DATA_SET) {
        return Err(Error::validation("Data sets cannot be specified as filter"));
    }

    if everywhere(dimension::OPERAND) {
        if everywhere(dimension::INDICATOR) {
            return Err(Error::validation(
                "Indicators and detailed data elements cannot be specified together",
            ));
        }
        if everywhere(dimension::DATA_ELEMENT) {
            return Err(Error::validation(
                "Detailed data elements and totals cannot be specified together",
            ));
        }
        if everywhere(dimension::DATA_SET) {
            return Err(Error::validation(
                "Data sets and detailed data elements cannot be specified together",
            ));
        }
        if everywhere(dimension::CATEGORY) {
            return Err(Error::validation(
                "Categories and detailed data elements cannot be specified together",
            ));
        }
    }

    if everywhere(dimension::INDICATOR) && aggregation_type != AggregationType::Default {
        return Err(Error::validation(
            "Indicators and aggregation types cannot be specified together",
        ));
    }

    Ok(())
}

impl Layout {
    /// Validates a configuration into a layout, or fails with a user-facing
    /// message.
    pub fn build(config: LayoutConfig, registry: &DimensionRegistry) -> Result<Layout> {
        let kind = config
            .kind
            .as_deref()
            .and_then(ChartKind::parse)
            .unwrap_or(ChartKind::Column);

        let columns = valid_axis(&config.columns, registry);
        let rows = valid_axis(&config.rows, registry);
        let filters = valid_axis(&config.filters, registry);

        let aggregation_type = config
            .aggregation_type
            .as_deref()
            .and_then(AggregationType::parse)
            .unwrap_or_default();

        check_rules(&columns, &rows, &filters, aggregation_type)?;

        let relative_period_date = config.relative_period_date.filter(|s| {
            let ok = NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
            if !ok {
                warn!(date = s.as_str(), "ignoring unparsable relative period date");
            }
            ok
        });

        Ok(Layout {
            kind,
            columns,
            rows,
            filters,
            show_values: config.show_values.or(config.show_data).unwrap_or(true),
            hide_empty_rows: config.hide_empty_rows.unwrap_or(true),
            show_trend_line: config.show_trend_line.or(config.regression).unwrap_or(false),
            completed_only: config.completed_only.unwrap_or(false),
            target_line_value: config.target_line_value.as_ref().and_then(LooseNumber::to_f64),
            // Legacy label fields win over their title successors.
            target_line_title: config.target_line_label.or(config.target_line_title),
            base_line_value: config.base_line_value.as_ref().and_then(LooseNumber::to_f64),
            base_line_title: config.base_line_label.or(config.base_line_title),
            sort_order: config.sort_order.unwrap_or(0),
            aggregation_type,
            range_axis_max_value: config.range_axis_max_value,
            range_axis_min_value: config.range_axis_min_value,
            range_axis_steps: config.range_axis_steps.filter(|s| *s > 0),
            range_axis_decimals: config.range_axis_decimals.filter(|d| *d > 0),
            range_axis_title: config.range_axis_label.or(config.range_axis_title),
            domain_axis_title: config.domain_axis_label.or(config.domain_axis_title),
            hide_legend: config.hide_legend.unwrap_or(false),
            hide_title: config.hide_title.unwrap_or(false),
            title: config.title.filter(|t| !t.is_empty()),
            display_property: config
                .display_property
                .as_deref()
                .and_then(DisplayProperty::parse)
                .unwrap_or_default(),
            user_org_unit: config
                .user_org_unit
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
            relative_period_date,
            domain_axis_style: config.domain_axis_style,
            range_axis_style: config.range_axis_style,
            legend_style: config.legend_style,
            series_style: config.series_style,
            id: config.id,
            name: config.name,
        })
    }

    /// Parses and validates a raw JSON configuration.
    pub fn from_value(value: &Value, registry: &DimensionRegistry) -> Result<Layout> {
        let config: LayoutConfig = serde_json::from_value(value.clone())
            .map_err(|e| Error::validation(format!("Invalid chart configuration: {e}")))?;
        Layout::build(config, registry)
    }

    /// All dimensions in layout order: columns, rows, filters.
    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.columns
            .iter()
            .chain(self.rows.iter())
            .chain(self.filters.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> DimensionRegistry {
        DimensionRegistry::with_builtins()
    }

    fn layout(value: Value) -> Result<Layout> {
        Layout::from_value(&value, &registry())
    }

    fn base_config() -> Value {
        json!({
            "type": "column",
            "columns": [{"dimension": "dx", "items": [{"id": "Uvn6LCg7dVU"}]}],
            "rows": [{"dimension": "pe", "items": [{"id": "LAST_12_MONTHS"}]}],
            "filters": [{"dimension": "ou", "items": [{"id": "USER_ORGUNIT"}]}],
        })
    }

    #[test]
    fn minimal_config_validates_with_defaults() {
        let l = layout(base_config()).unwrap();
        assert_eq!(l.kind, ChartKind::Column);
        assert!(l.show_values);
        assert!(l.hide_empty_rows);
        assert!(!l.show_trend_line);
        assert_eq!(l.sort_order, 0);
        assert_eq!(l.aggregation_type, AggregationType::Default);
        assert_eq!(l.display_property, DisplayProperty::Name);
    }

    #[test]
    fn server_enum_chart_types_map_to_client_kinds() {
        let mut v = base_config();
        v["type"] = json!("STACKED_COLUMN");
        assert_eq!(layout(v).unwrap().kind, ChartKind::StackedColumn);

        let mut v = base_config();
        v["type"] = json!("weird");
        assert_eq!(layout(v).unwrap().kind, ChartKind::Column);
    }

    #[test]
    fn malformed_items_are_dropped_not_fatal() {
        let mut v = base_config();
        v["columns"] = json!([
            {"dimension": "dx", "items": [{"id": ""}, "junk", {"id": "abc", "name": "Kept"}]},
            {"dimension": "", "items": [{"id": "x"}]},
            {"no_dimension": true},
        ]);
        let l = layout(v).unwrap();
        assert_eq!(l.columns.len(), 1);
        assert_eq!(l.columns[0].items, vec![Record::named("abc", "Kept")]);
    }

    #[test]
    fn category_dimension_needs_no_items() {
        let mut v = base_config();
        v["columns"] = json!([
            {"dimension": "dx", "items": [{"id": "a"}]},
            {"dimension": "co"},
        ]);
        let l = layout(v).unwrap();
        assert_eq!(l.columns.len(), 2);
        assert!(l.columns[1].items.is_empty());
    }

    #[test]
    fn empty_axes_are_rejected() {
        let mut v = base_config();
        v["columns"] = json!([]);
        assert_eq!(layout(v).unwrap_err().to_string(), "No series items selected");

        let mut v = base_config();
        v["rows"] = json!([]);
        assert_eq!(layout(v).unwrap_err().to_string(), "No category items selected");
    }

    #[test]
    fn a_period_is_required_somewhere() {
        let mut v = base_config();
        v["rows"] = json!([{"dimension": "ou", "items": [{"id": "root"}]}]);
        v["filters"] = json!([]);
        assert_eq!(
            layout(v).unwrap_err().to_string(),
            "At least one period must be specified as series, category or filter"
        );
    }

    #[test]
    fn forbidden_filters_are_rejected() {
        for (dim, msg) in [
            ("in", "Indicators cannot be specified as filter"),
            ("co", "Categories cannot be specified as filter"),
            ("ds", "Data sets cannot be specified as filter"),
        ] {
            let mut v = base_config();
            v["filters"] = json!([
                {"dimension": "ou", "items": [{"id": "root"}]},
                {"dimension": dim, "items": [{"id": "x"}]},
            ]);
            assert_eq!(layout(v).unwrap_err().to_string(), msg);
        }
    }

    #[test]
    fn operands_exclude_other_data_object_types() {
        let mut v = base_config();
        v["columns"] = json!([
            {"dimension": "dc", "items": [{"id": "op1"}]},
            {"dimension": "in", "items": [{"id": "in1"}]},
        ]);
        assert_eq!(
            layout(v).unwrap_err().to_string(),
            "Indicators and detailed data elements cannot be specified together"
        );
    }

    #[test]
    fn indicators_exclude_aggregation_types() {
        let mut v = base_config();
        v["columns"] = json!([{"dimension": "in", "items": [{"id": "in1"}]}]);
        v["aggregationType"] = json!("COUNT");
        assert_eq!(
            layout(v).unwrap_err().to_string(),
            "Indicators and aggregation types cannot be specified together"
        );

        let mut v = base_config();
        v["columns"] = json!([{"dimension": "in", "items": [{"id": "in1"}]}]);
        v["aggregationType"] = json!("DEFAULT");
        assert!(layout(v).is_ok());
    }

    #[test]
    fn legacy_fields_take_precedence() {
        let mut v = base_config();
        v["showData"] = json!(false);
        v["regression"] = json!(true);
        v["targetLineLabel"] = json!("Goal");
        v["targetLineTitle"] = json!("Ignored");
        v["rangeAxisLabel"] = json!("Coverage");
        let l = layout(v).unwrap();
        assert!(!l.show_values);
        assert!(l.show_trend_line);
        assert_eq!(l.target_line_title.as_deref(), Some("Goal"));
        assert_eq!(l.range_axis_title.as_deref(), Some("Coverage"));
    }

    #[test]
    fn numeric_strings_are_accepted_for_line_values() {
        let mut v = base_config();
        v["targetLineValue"] = json!("80");
        v["baseLineValue"] = json!("junk");
        let l = layout(v).unwrap();
        assert_eq!(l.target_line_value, Some(80.0));
        assert_eq!(l.base_line_value, None);
    }

    #[test]
    fn invalid_relative_period_date_is_ignored() {
        let mut v = base_config();
        v["relativePeriodDate"] = json!("2016-13-40");
        assert_eq!(layout(v).unwrap().relative_period_date, None);

        let mut v = base_config();
        v["relativePeriodDate"] = json!("2016-01-15");
        assert_eq!(
            layout(v).unwrap().relative_period_date.as_deref(),
            Some("2016-01-15")
        );
    }

    #[test]
    fn user_org_unit_accepts_string_or_array() {
        let mut v = base_config();
        v["userOrgUnit"] = json!("ImspTQPwCqd");
        assert_eq!(layout(v).unwrap().user_org_unit, ["ImspTQPwCqd"]);

        let mut v = base_config();
        v["userOrgUnit"] = json!(["a", "b"]);
        assert_eq!(layout(v).unwrap().user_org_unit, ["a", "b"]);
    }
}
