//! Analytics response handling: tolerant parsing, the extended response with
//! its composite-key cell index, and response metadata.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;

use crate::dimension::{self, VALUE_HEADER};
use crate::error::{Error, Result};
use crate::xlayout::XLayout;

/// Name map plus per-dimension resolved id lists from a metadata response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaData {
    /// Id to display name, covering every id in `dimensions`.
    pub names: FxHashMap<String, String>,
    /// Wire name to resolved item ids, in server order.
    pub dimensions: IndexMap<String, Vec<String>>,
}

impl MetaData {
    /// Reads a `metaData` object. Anything that is not the name map or an
    /// array of strings is ignored.
    pub fn from_value(value: &Value) -> MetaData {
        let mut meta = MetaData::default();
        let Some(obj) = value.as_object() else {
            return meta;
        };

        for (key, entry) in obj {
            if key == "names" {
                if let Some(names) = entry.as_object() {
                    for (id, name) in names {
                        if let Some(name) = name.as_str() {
                            meta.names.insert(id.clone(), name.to_owned());
                        }
                    }
                }
            } else if let Some(arr) = entry.as_array() {
                let ids: Vec<String> = arr
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect();
                meta.dimensions.insert(key.clone(), ids);
            }
        }
        meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub meta: bool,
}

/// A raw analytics response: headers, metadata and rows of string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsResponse {
    pub headers: Vec<Header>,
    pub meta_data: MetaData,
    pub rows: Vec<Vec<String>>,
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl AnalyticsResponse {
    /// Parses a response payload. Malformed headers and short rows are
    /// dropped with a warning; a response without usable headers is fatal.
    pub fn from_value(value: &Value) -> Result<AnalyticsResponse> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::response("payload is not an object"))?;

        let raw_headers = obj
            .get("headers")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::response("payload has no headers"))?;

        let mut headers = Vec::with_capacity(raw_headers.len());
        for raw in raw_headers {
            let parsed = raw.as_object().and_then(|h| {
                let name = h.get("name")?.as_str()?;
                Some(Header {
                    name: name.to_owned(),
                    meta: h.get("meta").and_then(Value::as_bool).unwrap_or(false),
                })
            });
            match parsed {
                Some(h) => headers.push(h),
                None => warn!("dropping malformed response header"),
            }
        }
        if headers.is_empty() {
            return Err(Error::response("payload has no usable headers"));
        }

        let mut rows = Vec::new();
        if let Some(raw_rows) = obj.get("rows").and_then(Value::as_array) {
            for raw in raw_rows {
                match raw.as_array() {
                    Some(cells) => {
                        if cells.len() != headers.len() {
                            warn!(
                                cells = cells.len(),
                                headers = headers.len(),
                                "row length differs from header count"
                            );
                        }
                        rows.push(cells.iter().map(cell_to_string).collect());
                    }
                    None => warn!("dropping non-array response row"),
                }
            }
        }

        let meta_data = MetaData::from_value(obj.get("metaData").unwrap_or(&Value::Null));

        Ok(AnalyticsResponse {
            headers,
            meta_data,
            rows,
        })
    }

    /// Replaces the metadata, used when data and metadata come from separate
    /// requests.
    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }
}

/// Composite lookup key: one segment per keyed header, in a fixed order.
/// Structural equality over segments, so ids that are prefixes of other ids
/// cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataKey(Vec<String>);

impl DataKey {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

/// A header annotated with its column index and, for meta headers, the ids
/// the layout selected under its wire name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XHeader {
    pub name: String,
    pub index: usize,
    pub meta: bool,
    pub ids: Vec<String>,
}

impl XHeader {
    pub fn size(&self) -> usize {
        self.ids.len()
    }
}

/// The extended response: header lookup by name plus the cell index keyed by
/// the axis dimension ids of each row.
///
/// When the response carries a category (`co`) header the layout did not place
/// on an axis, the category segment is spliced into each row key immediately
/// after the data-item segment. Lookups that do not address categories then
/// miss those disaggregated rows, which callers treat as "no value".
#[derive(Debug, Clone)]
pub struct XResponse {
    response: AnalyticsResponse,
    name_header_map: FxHashMap<String, XHeader>,
    id_value_map: FxHashMap<DataKey, String>,
    /// Segment position of the injected category id, when injection applies.
    injected_co_slot: Option<usize>,
    value_index: usize,
}

impl XResponse {
    /// Indexes a response against the layout it answers.
    ///
    /// Fails with [`Error::MissingHeader`] when the value header or the
    /// header of any axis dimension is absent.
    pub fn build(xlayout: &XLayout, response: AnalyticsResponse) -> Result<XResponse> {
        let mut name_header_map = FxHashMap::default();
        for (index, header) in response.headers.iter().enumerate() {
            let ids = if header.meta {
                xlayout.ids_for(&header.name).to_vec()
            } else {
                Vec::new()
            };
            name_header_map.insert(
                header.name.clone(),
                XHeader {
                    name: header.name.clone(),
                    index,
                    meta: header.meta,
                    ids,
                },
            );
        }

        let value_index = name_header_map
            .get(VALUE_HEADER)
            .map(|h| h.index)
            .ok_or_else(|| Error::MissingHeader {
                name: VALUE_HEADER.to_owned(),
            })?;

        let mut key_indexes = Vec::with_capacity(xlayout.axis_dimension_names.len());
        for name in &xlayout.axis_dimension_names {
            let header = name_header_map
                .get(name)
                .ok_or_else(|| Error::MissingHeader { name: name.clone() })?;
            key_indexes.push(header.index);
        }

        let mut injected_co_slot = None;
        if !xlayout
            .axis_dimension_names
            .iter()
            .any(|n| n == dimension::CATEGORY)
        {
            if let Some(co) = name_header_map.get(dimension::CATEGORY) {
                let slot = xlayout
                    .axis_dimension_names
                    .iter()
                    .position(|n| n == dimension::DATA)
                    .map(|p| p + 1)
                    .unwrap_or(0);
                key_indexes.insert(slot, co.index);
                injected_co_slot = Some(slot);
            }
        }

        let width = key_indexes.iter().copied().max().unwrap_or(0).max(value_index);
        let mut id_value_map =
            FxHashMap::with_capacity_and_hasher(response.rows.len(), Default::default());
        for row in &response.rows {
            if row.len() <= width {
                warn!(cells = row.len(), "skipping row too short for key columns");
                continue;
            }
            let key = DataKey::new(key_indexes.iter().map(|&i| row[i].clone()).collect());
            id_value_map.insert(key, row[value_index].clone());
        }

        Ok(XResponse {
            response,
            name_header_map,
            id_value_map,
            injected_co_slot,
            value_index,
        })
    }

    pub fn header(&self, name: &str) -> Option<&XHeader> {
        self.name_header_map.get(name)
    }

    pub fn names(&self) -> &FxHashMap<String, String> {
        &self.response.meta_data.names
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.response.meta_data
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.response.rows
    }

    pub fn value_index(&self) -> usize {
        self.value_index
    }

    /// The cell addressed by one id per axis dimension, in axis order. The
    /// injected category segment, if any, is matched as empty.
    pub fn value(&self, axis_ids: &[&str]) -> Option<&str> {
        let mut segments: Vec<String> = axis_ids.iter().map(|s| (*s).to_owned()).collect();
        if let Some(slot) = self.injected_co_slot {
            if slot <= segments.len() {
                segments.insert(slot, String::new());
            }
        }
        self.id_value_map
            .get(&DataKey::new(segments))
            .map(String::as_str)
    }

    /// Raw key lookup, for callers that build their own segment lists.
    pub fn lookup(&self, key: &DataKey) -> Option<&str> {
        self.id_value_map.get(key).map(String::as_str)
    }
}
