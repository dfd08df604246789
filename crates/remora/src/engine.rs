//! The render engine: request choreography over an [`AnalyticsSource`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, warn};

use remora_core::{
    AnalyticsQuery, AnalyticsResponse, ChartContext, ChartKind, ChartModel, ChartOptions,
    DimensionRegistry, GeneratorRegistry, Layout, LegendSet, MetaData, UserContext, XLayout,
    XResponse, dimension, synchronized_xlayout,
};

/// Transport failure reported by an [`AnalyticsSource`].
#[derive(Debug, thiserror::Error)]
#[error("analytics request failed: {message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] remora_core::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// The transport collaborator. Implementations resolve an assembled query
/// against an analytics backend and return the raw JSON payload.
pub trait AnalyticsSource {
    fn fetch(
        &self,
        query: &AnalyticsQuery,
    ) -> impl Future<Output = Result<Value, SourceError>>;

    /// The legend set attached to a data item, used for the gauge fill.
    /// Sources without legend-set access keep the default.
    fn legend_set(
        &self,
        data_item_id: &str,
    ) -> impl Future<Output = Result<Option<LegendSet>, SourceError>> {
        let _ = data_item_id;
        async { Ok(None) }
    }
}

/// A successful render: the chart model plus the extended layout it was
/// generated from (the layout carries the render-target uuid).
#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub model: ChartModel,
    pub xlayout: XLayout,
}

/// What a render call produced. Only `Chart` carries a model; the other
/// variants are normal outcomes a caller presents differently, not errors.
#[derive(Debug)]
pub enum RenderOutcome {
    Chart(Box<RenderedChart>),
    /// The data request returned no rows for the selection.
    NoData,
    /// The configuration failed validation; the message is user-facing.
    Invalid { message: String },
    /// A newer render started before this one finished.
    Superseded,
}

/// Orchestrates the pipeline: validate, expand, fetch metadata, synchronize,
/// fetch data, index, generate.
///
/// Each render call takes the next value of a monotonically increasing
/// generation counter. A render whose generation is no longer current when a
/// request returns resolves to [`RenderOutcome::Superseded`] instead of
/// racing the newer one.
pub struct Engine {
    dimensions: DimensionRegistry,
    generators: GeneratorRegistry,
    options: ChartOptions,
    user: UserContext,
    generation: AtomicU64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_registries(
            DimensionRegistry::with_builtins(),
            GeneratorRegistry::with_defaults(),
        )
    }

    pub fn with_registries(dimensions: DimensionRegistry, generators: GeneratorRegistry) -> Self {
        Self {
            dimensions,
            generators,
            options: ChartOptions::default(),
            user: UserContext::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn set_chart_options(&mut self, options: ChartOptions) {
        self.options = options;
    }

    pub fn set_user_context(&mut self, user: UserContext) {
        self.user = user;
    }

    pub fn dimensions_mut(&mut self) -> &mut DimensionRegistry {
        &mut self.dimensions
    }

    /// Marks every render currently in flight as superseded.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Runs the full pipeline for one configuration.
    ///
    /// Validation-class failures resolve to [`RenderOutcome::Invalid`] so the
    /// caller can keep a previously rendered chart on screen; transport
    /// failures and structurally broken payloads are errors.
    pub async fn render<S: AnalyticsSource>(
        &self,
        source: &S,
        config: &Value,
    ) -> Result<RenderOutcome, EngineError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let layout = match Layout::from_value(config, &self.dimensions) {
            Ok(layout) => layout,
            Err(e) => return invalid_or_err(e),
        };
        let xlayout = match XLayout::from_layout(&layout, &self.dimensions) {
            Ok(x) => x,
            Err(e) => return invalid_or_err(e),
        };

        // Metadata first: the data request depends on the resolved selection.
        let meta_query = AnalyticsQuery::metadata(&xlayout, &self.user);
        debug!(query = meta_query.to_query_string(), "fetching metadata");
        let meta_payload = source.fetch(&meta_query).await?;
        if self.superseded(generation) {
            return Ok(RenderOutcome::Superseded);
        }
        let meta = MetaData::from_value(meta_payload.get("metaData").unwrap_or(&Value::Null));

        let xlayout = match synchronized_xlayout(&xlayout, &meta, &self.dimensions) {
            Ok(x) => x,
            Err(e) => return invalid_or_err(e),
        };

        let data_query = AnalyticsQuery::data(&xlayout, &self.user);
        debug!(query = data_query.to_query_string(), "fetching data");
        let data_payload = source.fetch(&data_query).await?;
        if self.superseded(generation) {
            return Ok(RenderOutcome::Superseded);
        }

        let response = AnalyticsResponse::from_value(&data_payload)?.with_meta_data(meta);
        if response.rows.is_empty() {
            debug!("no values found for the current selection");
            return Ok(RenderOutcome::NoData);
        }
        let xresponse = match XResponse::build(&xlayout, response) {
            Ok(x) => x,
            Err(e) => return invalid_or_err(e),
        };

        // A gauge colors its fill by the legend set of the sliced data item.
        // A failed lookup degrades to the neutral fill.
        let mut legend_set = None;
        if xlayout.layout.kind == ChartKind::Gauge {
            if let Some(id) = xlayout.ids_for(dimension::DATA).first() {
                match source.legend_set(id).await {
                    Ok(set) => legend_set = set.map(LegendSet::sorted),
                    Err(e) => warn!(error = %e, "legend set lookup failed"),
                }
            }
        }
        if self.superseded(generation) {
            return Ok(RenderOutcome::Superseded);
        }

        let ctx = ChartContext {
            xlayout: &xlayout,
            xresponse: &xresponse,
            legend_set: legend_set.as_ref(),
            options: &self.options,
        };
        let model = match self.generators.generate(&ctx) {
            Ok(model) => model,
            Err(e) => return invalid_or_err(e),
        };

        debug!(
            kind = model.kind.as_str(),
            records = model.store.records.len(),
            "chart model generated"
        );
        Ok(RenderOutcome::Chart(Box::new(RenderedChart {
            model,
            xlayout,
        })))
    }
}

fn invalid_or_err(err: remora_core::Error) -> Result<RenderOutcome, EngineError> {
    if err.is_validation() {
        Ok(RenderOutcome::Invalid {
            message: err.to_string(),
        })
    } else {
        Err(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use remora_core::SeriesRole;
    use serde_json::json;

    struct StubSource {
        meta: Value,
        data: Value,
        legend: Option<LegendSet>,
    }

    impl StubSource {
        fn new(meta: Value, data: Value) -> Self {
            Self {
                meta,
                data,
                legend: None,
            }
        }
    }

    impl AnalyticsSource for StubSource {
        async fn fetch(&self, query: &AnalyticsQuery) -> Result<Value, SourceError> {
            let is_meta = query.params().iter().any(|(k, _)| k == "skipData");
            Ok(if is_meta {
                self.meta.clone()
            } else {
                self.data.clone()
            })
        }

        async fn legend_set(&self, _data_item_id: &str) -> Result<Option<LegendSet>, SourceError> {
            Ok(self.legend.clone())
        }
    }

    fn config(kind: &str) -> Value {
        json!({
            "type": kind,
            "columns": [{"dimension": "dx", "items": [{"id": "d1"}, {"id": "d2"}]}],
            "rows": [{"dimension": "pe", "items": [{"id": "LAST_3_MONTHS"}]}],
            "filters": [{"dimension": "ou", "items": [{"id": "USER_ORGUNIT"}]}],
        })
    }

    fn meta_payload() -> Value {
        json!({
            "metaData": {
                "names": {
                    "d1": "ANC 1", "d2": "ANC 2",
                    "201601": "Jan", "201602": "Feb", "201603": "Mar",
                    "ouRoot": "Sierra Leone",
                },
                "dx": ["d1", "d2"],
                "pe": ["201601", "201602", "201603"],
                "ou": ["ouRoot"],
            },
        })
    }

    fn data_payload() -> Value {
        json!({
            "headers": [
                {"name": "dx", "meta": true},
                {"name": "pe", "meta": true},
                {"name": "value", "meta": false},
            ],
            "rows": [
                ["d1", "201601", "10"],
                ["d1", "201602", "20"],
                ["d2", "201601", "30"],
                ["d2", "201603", "40"],
            ],
        })
    }

    #[test]
    fn renders_a_chart_end_to_end() {
        let engine = Engine::new();
        let source = StubSource::new(meta_payload(), data_payload());

        let outcome = block_on(engine.render(&source, &config("column"))).unwrap();
        let chart = match outcome {
            RenderOutcome::Chart(chart) => chart,
            other => panic!("expected a chart, got {other:?}"),
        };

        assert_eq!(chart.model.kind, ChartKind::Column);
        assert_eq!(chart.model.store.records.len(), 3);
        assert_eq!(chart.model.store.records[0].domain, "Jan");
        assert_eq!(chart.xlayout.ids_for("pe").len(), 3);
        assert!(!chart.xlayout.table_uuid.is_empty());
    }

    #[test]
    fn empty_data_resolves_to_no_data() {
        let engine = Engine::new();
        let mut data = data_payload();
        data["rows"] = json!([]);
        let source = StubSource::new(meta_payload(), data);

        let outcome = block_on(engine.render(&source, &config("column"))).unwrap();
        assert!(matches!(outcome, RenderOutcome::NoData));
    }

    #[test]
    fn invalid_config_resolves_to_invalid() {
        let engine = Engine::new();
        let source = StubSource::new(meta_payload(), data_payload());
        let mut bad = config("column");
        bad["columns"] = json!([]);

        let outcome = block_on(engine.render(&source, &bad)).unwrap();
        match outcome {
            RenderOutcome::Invalid { message } => {
                assert_eq!(message, "No series items selected");
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn broken_payload_is_an_error() {
        let engine = Engine::new();
        let source = StubSource::new(meta_payload(), json!({"rows": []}));

        let err = block_on(engine.render(&source, &config("column"))).unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
    }

    #[test]
    fn gauge_uses_the_source_legend_set() {
        let engine = Engine::new();
        let mut source = StubSource::new(meta_payload(), data_payload());
        source.legend = LegendSet::from_value(&json!({
            "legends": [
                {"startValue": 0, "endValue": 15, "color": "#ff0000"},
                {"startValue": 15, "endValue": 100, "color": "#00ff00"},
            ],
        }));

        let outcome = block_on(engine.render(&source, &config("gauge"))).unwrap();
        let chart = match outcome {
            RenderOutcome::Chart(chart) => chart,
            other => panic!("expected a chart, got {other:?}"),
        };
        // First cell is d1 at Jan = 10, inside the red interval.
        assert_eq!(chart.model.series[0].colors[0], "#ff0000");
    }

    /// A source that starts a newer render mid-flight.
    struct InvalidatingSource<'a> {
        engine: &'a Engine,
        inner: StubSource,
    }

    impl AnalyticsSource for InvalidatingSource<'_> {
        async fn fetch(&self, query: &AnalyticsQuery) -> Result<Value, SourceError> {
            self.engine.invalidate();
            self.inner.fetch(query).await
        }
    }

    #[test]
    fn stale_renders_resolve_to_superseded() {
        let engine = Engine::new();
        let source = InvalidatingSource {
            engine: &engine,
            inner: StubSource::new(meta_payload(), data_payload()),
        };

        let outcome = block_on(engine.render(&source, &config("column"))).unwrap();
        assert!(matches!(outcome, RenderOutcome::Superseded));
    }

    #[test]
    fn trend_series_survive_the_full_pipeline() {
        let engine = Engine::new();
        let source = StubSource::new(meta_payload(), data_payload());
        let mut cfg = config("line");
        cfg["showTrendLine"] = json!(true);

        let outcome = block_on(engine.render(&source, &cfg)).unwrap();
        let chart = match outcome {
            RenderOutcome::Chart(chart) => chart,
            other => panic!("expected a chart, got {other:?}"),
        };
        assert_eq!(chart.model.series[0].role, SeriesRole::Trend);
    }
}
