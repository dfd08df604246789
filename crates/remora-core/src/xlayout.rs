//! Extended layout: the layout joined with dimension metadata, precomputed
//! for request assembly and response lookup.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::dimension::DimensionRegistry;
use crate::error::{Error, Result};
use crate::layout::{self, Dimension, Layout, Record};
use crate::response::MetaData;

/// A dimension annotated with its wire name and the flat list of item ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XDimension {
    /// Canonical object name from the layout.
    pub dimension: String,
    /// Short wire-protocol name.
    pub dimension_name: String,
    pub items: Vec<Record>,
    pub ids: Vec<String>,
}

/// The extended layout. All derived lists and maps are computed once here so
/// request assembly and response lookup stay pure.
///
/// Equality ignores `table_uuid`: the uuid identifies one render instance,
/// not the layout, and is regenerated on every expansion.
#[derive(Debug, Clone)]
pub struct XLayout {
    pub layout: Layout,
    pub columns: Vec<XDimension>,
    pub rows: Vec<XDimension>,
    pub filters: Vec<XDimension>,

    /// Unique wire names per axis, in layout order.
    pub column_dimension_names: Vec<String>,
    pub row_dimension_names: Vec<String>,
    pub filter_dimension_names: Vec<String>,
    /// Column wire names followed by row wire names, unique.
    pub axis_dimension_names: Vec<String>,
    /// Lexicographically sorted copy, used by the cacheable data request.
    pub sorted_axis_dimension_names: Vec<String>,

    /// Wire name to items / ids, concatenated across dimensions that share a
    /// wire name (e.g. indicators and data elements both map to `dx`).
    pub dimension_name_items_map: IndexMap<String, Vec<Record>>,
    pub dimension_name_ids_map: IndexMap<String, Vec<String>>,
    /// Same ids with each list sorted, for the data request.
    pub dimension_name_sorted_ids_map: IndexMap<String, Vec<String>>,

    /// Identifies the render target produced from this expansion.
    pub table_uuid: String,
}

impl PartialEq for XLayout {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.columns == other.columns
            && self.rows == other.rows
            && self.filters == other.filters
            && self.column_dimension_names == other.column_dimension_names
            && self.row_dimension_names == other.row_dimension_names
            && self.filter_dimension_names == other.filter_dimension_names
            && self.axis_dimension_names == other.axis_dimension_names
            && self.sorted_axis_dimension_names == other.sorted_axis_dimension_names
            && self.dimension_name_items_map == other.dimension_name_items_map
            && self.dimension_name_ids_map == other.dimension_name_ids_map
            && self.dimension_name_sorted_ids_map == other.dimension_name_sorted_ids_map
    }
}

fn unique_names(dims: &[XDimension]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for dim in dims {
        if !names.contains(&dim.dimension_name) {
            names.push(dim.dimension_name.clone());
        }
    }
    names
}

impl XLayout {
    /// Expands a validated layout. Fails only if a dimension no longer
    /// resolves in the registry.
    pub fn from_layout(layout: &Layout, registry: &DimensionRegistry) -> Result<XLayout> {
        let expand_axis = |dims: &[Dimension]| -> Result<Vec<XDimension>> {
            dims.iter()
                .map(|dim| {
                    let info = registry.get(&dim.dimension).ok_or_else(|| {
                        Error::validation(format!("Unknown dimension: {}", dim.dimension))
                    })?;
                    Ok(XDimension {
                        dimension: dim.dimension.clone(),
                        dimension_name: info.dimension_name.clone(),
                        items: dim.items.clone(),
                        ids: dim.items.iter().map(|r| r.id.clone()).collect(),
                    })
                })
                .collect()
        };

        let columns = expand_axis(&layout.columns)?;
        let rows = expand_axis(&layout.rows)?;
        let filters = expand_axis(&layout.filters)?;

        let column_dimension_names = unique_names(&columns);
        let row_dimension_names = unique_names(&rows);
        let filter_dimension_names = unique_names(&filters);

        let mut axis_dimension_names = column_dimension_names.clone();
        for name in &row_dimension_names {
            if !axis_dimension_names.contains(name) {
                axis_dimension_names.push(name.clone());
            }
        }

        let mut sorted_axis_dimension_names = axis_dimension_names.clone();
        sorted_axis_dimension_names.sort();

        let mut dimension_name_items_map: IndexMap<String, Vec<Record>> = IndexMap::new();
        let mut dimension_name_ids_map: IndexMap<String, Vec<String>> = IndexMap::new();
        for dim in columns.iter().chain(rows.iter()).chain(filters.iter()) {
            dimension_name_items_map
                .entry(dim.dimension_name.clone())
                .or_default()
                .extend(dim.items.iter().cloned());
            dimension_name_ids_map
                .entry(dim.dimension_name.clone())
                .or_default()
                .extend(dim.ids.iter().cloned());
        }

        let mut dimension_name_sorted_ids_map = dimension_name_ids_map.clone();
        for ids in dimension_name_sorted_ids_map.values_mut() {
            ids.sort();
        }

        Ok(XLayout {
            layout: layout.clone(),
            columns,
            rows,
            filters,
            column_dimension_names,
            row_dimension_names,
            filter_dimension_names,
            axis_dimension_names,
            sorted_axis_dimension_names,
            dimension_name_items_map,
            dimension_name_ids_map,
            dimension_name_sorted_ids_map,
            table_uuid: Uuid::new_v4().to_string(),
        })
    }

    /// Ids selected under a wire name, empty if the name is not present.
    pub fn ids_for(&self, dimension_name: &str) -> &[String] {
        self.dimension_name_ids_map
            .get(dimension_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Items selected under a wire name.
    pub fn items_for(&self, dimension_name: &str) -> &[Record] {
        self.dimension_name_items_map
            .get(dimension_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Reconciles an extended layout with response metadata.
///
/// The server is authoritative: where the metadata carries a non-empty id list
/// under a dimension's object name, those ids replace the client selection
/// (relative periods become concrete periods, user org units become real
/// units, an item-less category dimension gains its options). Elsewhere the
/// client items are kept and missing display names are back-filled from the
/// metadata name map.
///
/// The merged dimensions go through business-rule validation again before the
/// expansion is rebuilt, so a selection the server resolved to nothing fails
/// with the same user-facing message the initial validation would give.
pub fn synchronized_xlayout(
    xlayout: &XLayout,
    meta: &MetaData,
    registry: &DimensionRegistry,
) -> Result<XLayout> {
    let sync_axis = |dims: &[XDimension]| -> Vec<Dimension> {
        dims.iter()
            .map(|dim| {
                let server_ids = meta
                    .dimensions
                    .get(dim.dimension.as_str())
                    .filter(|ids| !ids.is_empty());
                let items = match server_ids {
                    Some(ids) => ids
                        .iter()
                        .map(|id| Record {
                            id: id.clone(),
                            name: meta.names.get(id).cloned(),
                        })
                        .collect(),
                    None => dim
                        .items
                        .iter()
                        .map(|r| Record {
                            id: r.id.clone(),
                            name: r.name.clone().or_else(|| meta.names.get(&r.id).cloned()),
                        })
                        .collect(),
                };
                Dimension::new(dim.dimension.clone(), items)
            })
            .collect()
    };

    let columns = sync_axis(&xlayout.columns);
    let rows = sync_axis(&xlayout.rows);
    let filters = sync_axis(&xlayout.filters);

    layout::check_rules(&columns, &rows, &filters, xlayout.layout.aggregation_type)?;

    let mut layout = xlayout.layout.clone();
    layout.columns = columns;
    layout.rows = rows;
    layout.filters = filters;

    XLayout::from_layout(&layout, registry)
}
