//! Chart-model generation: one generator per chart kind, dispatched through
//! an injectable registry. The produced [`ChartModel`] is the terminal
//! artifact; drawing it is a renderer concern.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::layout::ChartKind;
use crate::legend::LegendSet;
use crate::response::XResponse;
use crate::store::{ChartStore, FieldId};
use crate::xlayout::XLayout;

/// Default series palette, cycled when a chart has more series than colors.
pub const SERIES_PALETTE: [&str; 17] = [
    "#94ae0a", "#0b3b68", "#a61120", "#ff8809", "#7c7474", "#a61187", "#ffd13e", "#24ad9a",
    "#a66111", "#414141", "#4500c4", "#1d5700", "#39ffb4", "#6600ff", "#ff40ff", "#ff4040",
    "#657a64",
];

const TREND_COLOR: &str = "#000000";
const GUIDE_COLOR: &str = "#051a2e";
const GAUGE_NEUTRAL_COLOR: &str = "#aaaaaa";
const GAUGE_REST_COLOR: &str = "#dddddd";

/// Character width below which the title drops to the small font.
const TITLE_CHAR_WIDTH: f64 = 11.6;
const TITLE_FONT_SMALL: f64 = 12.0;
const TITLE_FONT_LARGE: f64 = 17.0;

/// Rendering context that is not part of the layout: the viewport the chart
/// will occupy and whether it sits in a dashboard item (tighter text
/// heuristics).
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub width: f64,
    pub height: f64,
    pub dashboard: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            dashboard: false,
        }
    }
}

/// Everything a generator needs to produce a model.
#[derive(Debug, Clone, Copy)]
pub struct ChartContext<'a> {
    pub xlayout: &'a XLayout,
    pub xresponse: &'a XResponse,
    /// Thresholds for the gauge fill, already sorted.
    pub legend_set: Option<&'a LegendSet>,
    pub options: &'a ChartOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisPosition {
    Left,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericAxis {
    pub position: AxisPosition,
    pub fields: Vec<FieldId>,
    pub minimum: f64,
    /// `None` leaves the scale to the renderer.
    pub maximum: Option<f64>,
    /// Major tick steps, when overridden.
    pub steps: Option<u32>,
    /// Label decimal places, when the data calls for them.
    pub decimals: Option<usize>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAxis {
    pub position: AxisPosition,
    pub title: Option<String>,
    pub label_rotation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeAxis {
    pub minimum: f64,
    pub maximum: f64,
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Axis {
    Numeric(NumericAxis),
    Category(CategoryAxis),
    /// Radar value axis, drawn radially from the center.
    Radial(NumericAxis),
    Gauge(GaugeAxis),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesShape {
    Column,
    Bar,
    Line,
    Area,
    Pie,
    Radar,
    Gauge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRole {
    Data,
    Trend,
    Target,
    Base,
}

/// One series group. `fields`, `titles` and `colors` align by index.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesModel {
    pub shape: SeriesShape,
    pub role: SeriesRole,
    pub fields: Vec<FieldId>,
    pub titles: Vec<String>,
    pub colors: Vec<String>,
    pub stacked: bool,
    pub show_values: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendPosition {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendModel {
    pub hidden: bool,
    pub position: LegendPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleModel {
    pub text: String,
    pub font_size: f64,
    pub hidden: bool,
}

/// The fully specified chart: axes, series, legend, title and the store the
/// series fields point into.
#[derive(Debug, Clone)]
pub struct ChartModel {
    pub kind: ChartKind,
    pub axes: Vec<Axis>,
    pub series: Vec<SeriesModel>,
    pub legend: LegendModel,
    pub title: TitleModel,
    pub store: ChartStore,
}

pub type ChartGenerator = fn(&ChartContext) -> Result<ChartModel>;

/// Dispatch table from chart kind to generator. Injected so deployments can
/// override or extend kinds without touching the pipeline.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: FxHashMap<ChartKind, ChartGenerator>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(ChartKind::Column, column);
        registry.insert(ChartKind::StackedColumn, stacked_column);
        registry.insert(ChartKind::Bar, bar);
        registry.insert(ChartKind::StackedBar, stacked_bar);
        registry.insert(ChartKind::Line, line);
        registry.insert(ChartKind::Area, area);
        registry.insert(ChartKind::Pie, pie);
        registry.insert(ChartKind::Radar, radar);
        registry.insert(ChartKind::Gauge, gauge);
        registry
    }

    pub fn insert(&mut self, kind: ChartKind, generator: ChartGenerator) {
        self.generators.insert(kind, generator);
    }

    pub fn get(&self, kind: ChartKind) -> Option<ChartGenerator> {
        self.generators.get(&kind).copied()
    }

    pub fn generate(&self, ctx: &ChartContext) -> Result<ChartModel> {
        let kind = ctx.xlayout.layout.kind;
        let generator = self
            .get(kind)
            .ok_or_else(|| Error::UnsupportedChartKind {
                kind: kind.as_str().to_owned(),
            })?;
        generator(ctx)
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("kinds", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn palette(n: usize) -> Vec<String> {
    SERIES_PALETTE
        .iter()
        .cycle()
        .take(n)
        .map(|c| (*c).to_owned())
        .collect()
}

fn truncated(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(2)).collect();
        t.push_str("..");
        t
    }
}

/// Series legend titles: explicit label names win, then an explicit max
/// length, then a dashboard shrink when the full set will not fit the width.
fn series_titles(ctx: &ChartContext, store: &ChartStore) -> Vec<String> {
    let layout = &ctx.xlayout.layout;
    let mut titles: Vec<String> = store
        .range_fields
        .iter()
        .map(|f| store.field_name(f).to_owned())
        .collect();

    if let Some(style) = &layout.legend_style {
        if let Some(names) = &style.label_names {
            for (i, name) in names.iter().enumerate() {
                if i < titles.len() && !name.is_empty() {
                    titles[i] = name.clone();
                }
            }
        }
        if let Some(max) = style.label_max_length {
            if max > 0 {
                titles = titles.iter().map(|t| truncated(t, max)).collect();
            }
        }
    }

    if ctx.options.dashboard {
        let (item_len, char_len) = (23.0, 5.0);
        let chars: usize = titles.iter().map(|t| t.chars().count()).sum();
        let width = titles.len() as f64 * item_len + chars as f64 * char_len;
        if width > ctx.options.width {
            titles = titles.iter().map(|t| truncated(t, 10)).collect();
        }
    }

    titles
}

/// Legend placement: estimated width against the viewport decides top or
/// right; an explicit style position wins.
fn legend_model(ctx: &ChartContext, titles: &[String]) -> LegendModel {
    let layout = &ctx.xlayout.layout;
    let (item_len, char_len) = if ctx.options.dashboard {
        (24.0, 4.0)
    } else {
        (30.0, 6.0)
    };
    let chars: usize = titles.iter().map(|t| t.chars().count()).sum();
    let width = titles.len() as f64 * item_len + chars as f64 * char_len;

    let mut position = if width > ctx.options.width - 6.0 {
        LegendPosition::Right
    } else {
        LegendPosition::Top
    };
    if let Some(style) = &layout.legend_style {
        if let Some(p) = style.position.as_deref() {
            position = match p {
                "top" => LegendPosition::Top,
                "right" => LegendPosition::Right,
                "bottom" => LegendPosition::Bottom,
                "left" => LegendPosition::Left,
                _ => position,
            };
        }
    }

    LegendModel {
        hidden: layout.hide_legend,
        position,
    }
}

/// Default title: the filter selections, preceded by the sliced data and
/// category item for single-value kinds.
fn default_title(ctx: &ChartContext) -> String {
    let xlayout = ctx.xlayout;
    let names = ctx.xresponse.names();

    let mut ids: Vec<&str> = Vec::new();
    match xlayout.layout.kind {
        ChartKind::Pie => {
            if let Some(name) = xlayout.column_dimension_names.first() {
                ids.extend(xlayout.ids_for(name).first().map(String::as_str));
            }
        }
        ChartKind::Gauge => {
            if let Some(name) = xlayout.column_dimension_names.first() {
                ids.extend(xlayout.ids_for(name).first().map(String::as_str));
            }
            if let Some(name) = xlayout.row_dimension_names.first() {
                ids.extend(xlayout.ids_for(name).first().map(String::as_str));
            }
        }
        _ => {}
    }
    for name in &xlayout.filter_dimension_names {
        ids.extend(xlayout.ids_for(name).iter().map(String::as_str));
    }

    ids.iter()
        .map(|id| names.get(*id).map(String::as_str).unwrap_or(id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn title_model(ctx: &ChartContext) -> TitleModel {
    let layout = &ctx.xlayout.layout;
    let text = layout.title.clone().unwrap_or_else(|| default_title(ctx));

    let chars = text.chars().count().max(1) as f64;
    let font_size = if ctx.options.width / chars < TITLE_CHAR_WIDTH {
        TITLE_FONT_SMALL
    } else {
        TITLE_FONT_LARGE
    };

    TitleModel {
        text,
        font_size,
        hidden: layout.hide_title,
    }
}

fn numeric_axis(
    ctx: &ChartContext,
    store: &ChartStore,
    position: AxisPosition,
    stacked: bool,
) -> NumericAxis {
    let layout = &ctx.xlayout.layout;

    let data_minimum = store.minimum();
    let mut minimum = if data_minimum < 0.0 { data_minimum } else { 0.0 };

    // With extra line series over stacked columns the renderer cannot infer a
    // sensible scale, so precompute headroom rounded down to tens.
    let mut maximum = None;
    let has_guides = layout.show_trend_line
        || layout.target_line_value.is_some()
        || layout.base_line_value.is_some();
    if stacked && has_guides {
        let peak = store.maximum().max(store.maximum_sum()) * 1.1;
        maximum = Some((peak.ceil() / 10.0).floor() * 10.0);
    }

    if let Some(v) = layout.range_axis_min_value {
        minimum = v;
    }
    if let Some(v) = layout.range_axis_max_value {
        maximum = Some(v);
    }
    let steps = layout.range_axis_steps.map(|s| s.saturating_sub(1));

    let decimals = match layout.range_axis_decimals {
        Some(d) => Some(d as usize),
        None if store.has_decimals() && store.maximum() < 20.0 => {
            Some(store.number_of_decimals())
        }
        None => None,
    };

    NumericAxis {
        position,
        fields: store.numeric_fields(),
        minimum,
        maximum,
        steps,
        decimals,
        title: layout.range_axis_title.clone(),
    }
}

fn category_axis(ctx: &ChartContext, position: AxisPosition, default_rotation: f64) -> CategoryAxis {
    let layout = &ctx.xlayout.layout;
    let label_rotation = layout
        .domain_axis_style
        .as_ref()
        .and_then(|s| s.label_rotation)
        .unwrap_or(default_rotation);

    CategoryAxis {
        position,
        title: layout.domain_axis_title.clone(),
        label_rotation,
    }
}

fn trend_series(store: &ChartStore) -> Option<SeriesModel> {
    if store.trend_fields.is_empty() {
        return None;
    }
    Some(SeriesModel {
        shape: SeriesShape::Line,
        role: SeriesRole::Trend,
        fields: store.trend_fields.clone(),
        titles: store
            .trend_fields
            .iter()
            .map(|f| store.field_name(f).to_owned())
            .collect(),
        colors: vec![TREND_COLOR.to_owned(); store.trend_fields.len()],
        stacked: false,
        show_values: false,
    })
}

fn guide_series(store: &ChartStore, fields: &[FieldId], role: SeriesRole) -> Option<SeriesModel> {
    if fields.is_empty() {
        return None;
    }
    Some(SeriesModel {
        shape: SeriesShape::Line,
        role,
        fields: fields.to_vec(),
        titles: fields.iter().map(|f| store.field_name(f).to_owned()).collect(),
        colors: vec![GUIDE_COLOR.to_owned(); fields.len()],
        stacked: false,
        show_values: false,
    })
}

fn all_titles(series: &[SeriesModel]) -> Vec<String> {
    series.iter().flat_map(|s| s.titles.iter().cloned()).collect()
}

/// Shared scaffolding for the rectangular kinds. `swap` flips the axes for
/// the horizontal (bar) variants.
fn xy_chart(
    ctx: &ChartContext,
    shape: SeriesShape,
    stacked: bool,
    swap: bool,
    store: ChartStore,
) -> Result<ChartModel> {
    let layout = &ctx.xlayout.layout;
    let titles = series_titles(ctx, &store);

    let (numeric_position, category_position, rotation) = if swap {
        (AxisPosition::Bottom, AxisPosition::Left, 0.0)
    } else {
        (AxisPosition::Left, AxisPosition::Bottom, 315.0)
    };

    let axes = vec![
        Axis::Numeric(numeric_axis(ctx, &store, numeric_position, stacked)),
        Axis::Category(category_axis(ctx, category_position, rotation)),
    ];

    let mut series = Vec::new();
    if let Some(trend) = trend_series(&store) {
        series.push(trend);
    }
    series.push(SeriesModel {
        shape,
        role: SeriesRole::Data,
        fields: store.range_fields.clone(),
        colors: palette(titles.len()),
        titles,
        stacked,
        show_values: layout.show_values,
    });
    if let Some(target) = guide_series(&store, &store.target_fields, SeriesRole::Target) {
        series.push(target);
    }
    if let Some(base) = guide_series(&store, &store.base_fields, SeriesRole::Base) {
        series.push(base);
    }

    let legend = legend_model(ctx, &all_titles(&series));
    Ok(ChartModel {
        kind: layout.kind,
        axes,
        series,
        legend,
        title: title_model(ctx),
        store,
    })
}

pub fn column(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, false)?;
    xy_chart(ctx, SeriesShape::Column, false, false, store)
}

pub fn stacked_column(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, true)?;
    xy_chart(ctx, SeriesShape::Column, true, false, store)
}

pub fn bar(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, false)?;
    xy_chart(ctx, SeriesShape::Bar, false, true, store)
}

pub fn stacked_bar(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, true)?;
    xy_chart(ctx, SeriesShape::Bar, true, true, store)
}

pub fn line(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, false)?;
    xy_chart(ctx, SeriesShape::Line, false, false, store)
}

/// Area charts always drop empty rows: a gap in an area band reads as zero,
/// not as missing.
pub fn area(ctx: &ChartContext) -> Result<ChartModel> {
    let store = ChartStore::build_hiding_empty(ctx.xlayout, ctx.xresponse, true)?;
    xy_chart(ctx, SeriesShape::Area, false, false, store)
}

pub fn pie(ctx: &ChartContext) -> Result<ChartModel> {
    let layout = &ctx.xlayout.layout;
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, false)?;
    let field = store
        .range_fields
        .first()
        .cloned()
        .ok_or_else(|| Error::validation("No series items selected"))?;

    // One slice per record; the slice legend shows the domain values. The
    // palette is sized to the full category id list so colors stay stable
    // when empty rows are filtered out.
    let titles: Vec<String> = store.records.iter().map(|r| r.domain.clone()).collect();
    let color_count = ctx
        .xlayout
        .row_dimension_names
        .first()
        .and_then(|n| ctx.xresponse.header(n))
        .map(|h| h.size())
        .unwrap_or(titles.len())
        .max(titles.len());

    let series = vec![SeriesModel {
        shape: SeriesShape::Pie,
        role: SeriesRole::Data,
        fields: vec![field],
        colors: palette(color_count),
        titles: titles.clone(),
        stacked: false,
        show_values: layout.show_values,
    }];

    let legend = legend_model(ctx, &titles);
    Ok(ChartModel {
        kind: layout.kind,
        axes: Vec::new(),
        series,
        legend,
        title: title_model(ctx),
        store,
    })
}

pub fn radar(ctx: &ChartContext) -> Result<ChartModel> {
    let layout = &ctx.xlayout.layout;
    let store = ChartStore::build(ctx.xlayout, ctx.xresponse, false)?;
    let titles = series_titles(ctx, &store);

    let axes = vec![Axis::Radial(numeric_axis(
        ctx,
        &store,
        AxisPosition::Left,
        false,
    ))];
    let series = vec![SeriesModel {
        shape: SeriesShape::Radar,
        role: SeriesRole::Data,
        fields: store.range_fields.clone(),
        colors: palette(titles.len()),
        titles,
        stacked: false,
        show_values: layout.show_values,
    }];

    let legend = legend_model(ctx, &all_titles(&series));
    Ok(ChartModel {
        kind: layout.kind,
        axes,
        series,
        legend,
        title: title_model(ctx),
        store,
    })
}

/// Gauges show a single value on a fixed 0 to 100 dial. The fill color comes
/// from the legend set interval containing the value, falling back to a
/// neutral gray.
pub fn gauge(ctx: &ChartContext) -> Result<ChartModel> {
    let layout = &ctx.xlayout.layout;
    let store = ChartStore::build_single(ctx.xlayout, ctx.xresponse)?;
    let field = store
        .range_fields
        .first()
        .cloned()
        .ok_or_else(|| Error::validation("No series items selected"))?;

    let value = store
        .records
        .first()
        .and_then(|r| r.value(&field))
        .unwrap_or(0.0);
    let fill = ctx
        .legend_set
        .and_then(|set| set.color_by_value(value))
        .unwrap_or(GAUGE_NEUTRAL_COLOR);

    let series = vec![SeriesModel {
        shape: SeriesShape::Gauge,
        role: SeriesRole::Data,
        fields: vec![field.clone()],
        titles: vec![store.field_name(&field).to_owned()],
        colors: vec![fill.to_owned(), GAUGE_REST_COLOR.to_owned()],
        stacked: false,
        show_values: layout.show_values,
    }];

    Ok(ChartModel {
        kind: layout.kind,
        axes: vec![Axis::Gauge(GaugeAxis {
            minimum: 0.0,
            maximum: 100.0,
            steps: 10,
        })],
        series,
        legend: LegendModel {
            hidden: true,
            position: LegendPosition::Top,
        },
        title: title_model(ctx),
        store,
    })
}
