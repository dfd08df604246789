//! Core analytics chart pipeline.
//!
//! The pipeline turns a declarative chart configuration into a fully
//! specified, renderer-agnostic chart model:
//!
//! 1. [`Layout`] validates the configuration against the business rules.
//! 2. [`XLayout`] expands the layout with wire names and derived id lists,
//!    and is re-synchronized once server metadata resolves relative
//!    selections ([`synchronized_xlayout`]).
//! 3. [`AnalyticsQuery`] assembles the metadata and data requests.
//! 4. [`XResponse`] indexes the response cells by composite dimension key.
//! 5. [`ChartStore`] pivots the cells into records with derived series
//!    (totals, trend, target, base).
//! 6. [`GeneratorRegistry`] dispatches to a per-kind generator producing the
//!    terminal [`ChartModel`].
//!
//! No I/O happens here; transports live with the caller (see the `remora`
//! facade crate).

#![forbid(unsafe_code)]

pub mod chart;
pub mod dimension;
pub mod error;
pub mod layout;
pub mod legend;
pub mod query;
pub mod regression;
pub mod response;
pub mod store;
pub mod xlayout;

pub use chart::{
    Axis, AxisPosition, CategoryAxis, ChartContext, ChartGenerator, ChartModel, ChartOptions,
    GaugeAxis, GeneratorRegistry, LegendModel, LegendPosition, NumericAxis, SeriesModel,
    SeriesRole, SeriesShape, TitleModel,
};
pub use dimension::{DimensionInfo, DimensionRegistry};
pub use error::{Error, Result};
pub use layout::{
    AggregationType, ChartKind, Dimension, DisplayProperty, Layout, LayoutConfig, Record,
};
pub use legend::{LegendEntry, LegendSet};
pub use query::{AnalyticsQuery, UserContext};
pub use regression::SimpleRegression;
pub use response::{AnalyticsResponse, DataKey, MetaData, XResponse};
pub use store::{ChartStore, FieldId, StoreRecord};
pub use xlayout::{XDimension, XLayout, synchronized_xlayout};

#[cfg(test)]
mod tests;
