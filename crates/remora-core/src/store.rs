//! The chart store: the response pivoted into renderable records.
//!
//! Each series column gets a synthetic field id so that series derived later
//! (trend, target, base) can never collide with a server id. Records hold one
//! optional number per field; a missing cell stays `None` and renders as
//! "no data" rather than zero.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::error::Result;
use crate::regression::SimpleRegression;
use crate::response::XResponse;
use crate::xlayout::XLayout;

/// Opaque identifier for one store field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldId(String);

impl FieldId {
    fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One domain entry (a category-axis position) and its values per field.
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub domain_id: String,
    /// Display name shown on the category axis.
    pub domain: String,
    values: FxHashMap<FieldId, Option<f64>>,
}

impl StoreRecord {
    pub fn value(&self, field: &FieldId) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    fn is_empty(&self, fields: &[FieldId]) -> bool {
        fields.iter().all(|f| self.value(f).is_none())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartStore {
    pub records: Vec<StoreRecord>,
    /// One field per series column, in column order.
    pub range_fields: Vec<FieldId>,
    pub trend_fields: Vec<FieldId>,
    pub target_fields: Vec<FieldId>,
    pub base_fields: Vec<FieldId>,
    /// Per-record sum of the range fields, present when built stacked.
    pub total_field: Option<FieldId>,
    field_names: FxHashMap<FieldId, String>,
    field_sources: FxHashMap<FieldId, String>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Missing compares below every number, so ascending puts "no data" rows
/// first and descending puts them last.
fn cmp_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn decimal_places(v: f64) -> usize {
    let s = format!("{v}");
    s.find('.').map(|i| s.len() - i - 1).unwrap_or(0)
}

impl ChartStore {
    /// Builds the store over the full column/row id lists.
    pub fn build(xlayout: &XLayout, xresponse: &XResponse, stacked: bool) -> Result<ChartStore> {
        Self::build_inner(xlayout, xresponse, stacked, xlayout.layout.hide_empty_rows, false)
    }

    /// As [`build`](Self::build), with empty-row filtering forced on.
    pub fn build_hiding_empty(
        xlayout: &XLayout,
        xresponse: &XResponse,
        stacked: bool,
    ) -> Result<ChartStore> {
        Self::build_inner(xlayout, xresponse, stacked, true, false)
    }

    /// Builds a single-cell store over the first column and first row id.
    pub fn build_single(xlayout: &XLayout, xresponse: &XResponse) -> Result<ChartStore> {
        Self::build_inner(xlayout, xresponse, false, xlayout.layout.hide_empty_rows, true)
    }

    fn build_inner(
        xlayout: &XLayout,
        xresponse: &XResponse,
        stacked: bool,
        hide_empty_rows: bool,
        first_only: bool,
    ) -> Result<ChartStore> {
        let layout = &xlayout.layout;
        let names = xresponse.names();

        let column_name = xlayout.column_dimension_names.first();
        let row_name = xlayout.row_dimension_names.first();
        let mut column_ids: Vec<String> = column_name
            .map(|n| xlayout.ids_for(n).to_vec())
            .unwrap_or_default();
        let mut row_ids: Vec<String> = row_name
            .map(|n| xlayout.ids_for(n).to_vec())
            .unwrap_or_default();
        if first_only {
            column_ids.truncate(1);
            row_ids.truncate(1);
        }

        let mut store = ChartStore::default();
        let mut columns: Vec<(FieldId, String)> = Vec::with_capacity(column_ids.len());
        for id in &column_ids {
            let field = FieldId::new();
            let name = names.get(id).cloned().unwrap_or_else(|| id.clone());
            store.field_names.insert(field.clone(), name);
            store.field_sources.insert(field.clone(), id.clone());
            store.range_fields.push(field.clone());
            columns.push((field, id.clone()));
        }

        let total_field = stacked.then(FieldId::new);

        for row_id in &row_ids {
            let mut values: FxHashMap<FieldId, Option<f64>> = FxHashMap::default();
            for (field, column_id) in &columns {
                let parsed = xresponse
                    .value(&[column_id, row_id])
                    .and_then(|s| s.parse::<f64>().ok());
                values.insert(field.clone(), parsed);
            }

            let record = StoreRecord {
                domain_id: row_id.clone(),
                domain: names.get(row_id).cloned().unwrap_or_else(|| row_id.clone()),
                values,
            };
            if hide_empty_rows && record.is_empty(&store.range_fields) {
                continue;
            }
            store.records.push(record);
        }

        if let Some(total) = &total_field {
            store.field_names.insert(total.clone(), "Total".to_owned());
            for record in &mut store.records {
                let sum: f64 = store
                    .range_fields
                    .iter()
                    .map(|f| record.value(f).unwrap_or(0.0))
                    .sum();
                record.values.insert(total.clone(), Some(sum));
            }
            store.total_field = Some(total.clone());
        }

        if layout.sort_order != 0 {
            let key = store
                .total_field
                .clone()
                .or_else(|| store.range_fields.first().cloned());
            if let Some(key) = key {
                let ascending = layout.sort_order == -1;
                store.records.sort_by(|a, b| {
                    let ord = cmp_optional(a.value(&key), b.value(&key));
                    if ascending { ord } else { ord.reverse() }
                });
            }
        }

        if layout.show_trend_line {
            store.add_trend_fields(stacked);
        }
        if let Some(value) = layout.target_line_value {
            let title = layout.target_line_title.clone().unwrap_or_else(|| "Target".to_owned());
            store.add_constant_field(value, title, Kind::Target);
        }
        if let Some(value) = layout.base_line_value {
            let title = layout.base_line_title.clone().unwrap_or_else(|| "Base".to_owned());
            store.add_constant_field(value, title, Kind::Base);
        }

        Ok(store)
    }

    /// Fits a trend per series, or a single trend over the stacked totals.
    /// Missing cells contribute zero. Non-finite fits are dropped.
    fn add_trend_fields(&mut self, stacked: bool) {
        let sources: Vec<(FieldId, String)> = if stacked {
            match &self.total_field {
                Some(total) => vec![(total.clone(), "Trend (Total)".to_owned())],
                None => Vec::new(),
            }
        } else {
            self.range_fields
                .iter()
                .map(|f| (f.clone(), format!("Trend ({})", self.field_name(f))))
                .collect()
        };

        for (source, name) in sources {
            let mut regression = SimpleRegression::new();
            for (i, record) in self.records.iter().enumerate() {
                regression.add_data(i as f64, record.value(&source).unwrap_or(0.0));
            }

            let field = FieldId::new();
            self.field_names.insert(field.clone(), name);
            for (i, record) in self.records.iter_mut().enumerate() {
                let predicted = round1(regression.predict(i as f64));
                record
                    .values
                    .insert(field.clone(), predicted.is_finite().then_some(predicted));
            }
            self.trend_fields.push(field);
        }
    }

    fn add_constant_field(&mut self, value: f64, name: String, kind: Kind) {
        let field = FieldId::new();
        self.field_names.insert(field.clone(), name);
        for record in &mut self.records {
            record.values.insert(field.clone(), Some(value));
        }
        match kind {
            Kind::Target => self.target_fields.push(field),
            Kind::Base => self.base_fields.push(field),
        }
    }

    /// All value-bearing fields: range, trend, target, base.
    pub fn numeric_fields(&self) -> Vec<FieldId> {
        self.range_fields
            .iter()
            .chain(self.trend_fields.iter())
            .chain(self.target_fields.iter())
            .chain(self.base_fields.iter())
            .cloned()
            .collect()
    }

    pub fn field_name(&self, field: &FieldId) -> &str {
        self.field_names.get(field).map(String::as_str).unwrap_or("")
    }

    /// The server id behind a range field.
    pub fn source_id(&self, field: &FieldId) -> Option<&str> {
        self.field_sources.get(field).map(String::as_str)
    }

    pub fn maximum(&self) -> f64 {
        let fields = self.numeric_fields();
        self.records
            .iter()
            .flat_map(|r| fields.iter().filter_map(|f| r.value(f)))
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    pub fn minimum(&self) -> f64 {
        let fields = self.numeric_fields();
        self.records
            .iter()
            .flat_map(|r| fields.iter().filter_map(|f| r.value(f)))
            .filter(|v| v.is_finite())
            .fold(0.0, f64::min)
    }

    /// Largest per-record sum over the range fields.
    pub fn maximum_sum(&self) -> f64 {
        self.records
            .iter()
            .map(|r| {
                self.range_fields
                    .iter()
                    .map(|f| r.value(f).unwrap_or(0.0))
                    .sum::<f64>()
            })
            .fold(0.0, f64::max)
    }

    pub fn has_decimals(&self) -> bool {
        self.records
            .iter()
            .flat_map(|r| self.range_fields.iter().filter_map(|f| r.value(f)))
            .any(|v| v.is_finite() && v.fract() != 0.0)
    }

    pub fn number_of_decimals(&self) -> usize {
        self.records
            .iter()
            .flat_map(|r| self.range_fields.iter().filter_map(|f| r.value(f)))
            .filter(|v| v.is_finite())
            .map(decimal_places)
            .max()
            .unwrap_or(0)
    }
}

enum Kind {
    Target,
    Base,
}
