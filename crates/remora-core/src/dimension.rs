//! Dimension naming: canonical object names vs short wire-protocol names.

use rustc_hash::FxHashMap;

pub const DATA: &str = "dx";
pub const INDICATOR: &str = "in";
pub const DATA_ELEMENT: &str = "de";
pub const OPERAND: &str = "dc";
pub const DATA_SET: &str = "ds";
pub const EVENT_DATA_ITEM: &str = "di";
pub const PROGRAM_INDICATOR: &str = "pi";
pub const PERIOD: &str = "pe";
pub const ORG_UNIT: &str = "ou";
pub const CATEGORY: &str = "co";

/// Header name carrying the measure in an analytics response.
pub const VALUE_HEADER: &str = "value";

/// One known dimension: the canonical object name used by layout
/// configurations, the short name used on the wire, and a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub object_name: String,
    pub dimension_name: String,
    pub name: String,
}

impl DimensionInfo {
    fn new(object_name: &str, dimension_name: &str, name: &str) -> Self {
        Self {
            object_name: object_name.to_owned(),
            dimension_name: dimension_name.to_owned(),
            name: name.to_owned(),
        }
    }
}

/// Registry mapping object names to dimension metadata.
///
/// Several data object types (indicators, data elements, operands, data sets,
/// event data items, program indicators) collapse onto the single `dx` wire
/// name. Dynamic dimensions defined by the server use their own id as both
/// object name and wire name.
#[derive(Debug, Clone, Default)]
pub struct DimensionRegistry {
    by_object_name: FxHashMap<String, DimensionInfo>,
    dynamic: Vec<String>,
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table every deployment shares.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for info in [
            DimensionInfo::new(DATA, DATA, "Data"),
            DimensionInfo::new(INDICATOR, DATA, "Indicator"),
            DimensionInfo::new(DATA_ELEMENT, DATA, "Data element"),
            DimensionInfo::new(OPERAND, DATA, "Operand"),
            DimensionInfo::new(DATA_SET, DATA, "Data set"),
            DimensionInfo::new(EVENT_DATA_ITEM, DATA, "Event data item"),
            DimensionInfo::new(PROGRAM_INDICATOR, DATA, "Program indicator"),
            DimensionInfo::new(PERIOD, PERIOD, "Period"),
            DimensionInfo::new(ORG_UNIT, ORG_UNIT, "Organisation unit"),
            DimensionInfo::new(CATEGORY, CATEGORY, "Category"),
        ] {
            registry.insert(info);
        }
        registry
    }

    pub fn insert(&mut self, info: DimensionInfo) {
        self.by_object_name.insert(info.object_name.clone(), info);
    }

    /// Registers a server-defined dynamic dimension. Its id doubles as the
    /// wire name. The dynamic list is kept sorted.
    pub fn register_dynamic(&mut self, id: &str, name: &str) {
        self.insert(DimensionInfo::new(id, id, name));
        if let Err(pos) = self.dynamic.binary_search_by(|d| d.as_str().cmp(id)) {
            self.dynamic.insert(pos, id.to_owned());
        }
    }

    pub fn get(&self, object_name: &str) -> Option<&DimensionInfo> {
        self.by_object_name.get(object_name)
    }

    /// Wire name for an object name, when known.
    pub fn dimension_name(&self, object_name: &str) -> Option<&str> {
        self.get(object_name).map(|d| d.dimension_name.as_str())
    }

    /// Ids of registered dynamic dimensions, sorted.
    pub fn dynamic_ids(&self) -> &[String] {
        &self.dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_object_types_share_the_dx_wire_name() {
        let registry = DimensionRegistry::with_builtins();
        for object_name in [DATA, INDICATOR, DATA_ELEMENT, OPERAND, DATA_SET] {
            assert_eq!(registry.dimension_name(object_name), Some(DATA));
        }
        assert_eq!(registry.dimension_name(PERIOD), Some(PERIOD));
        assert_eq!(registry.dimension_name(CATEGORY), Some(CATEGORY));
        assert_eq!(registry.dimension_name("nope"), None);
    }

    #[test]
    fn dynamic_dimensions_stay_sorted() {
        let mut registry = DimensionRegistry::with_builtins();
        registry.register_dynamic("zGender", "Gender");
        registry.register_dynamic("aAge", "Age group");
        registry.register_dynamic("zGender", "Gender");

        assert_eq!(registry.dynamic_ids(), ["aAge", "zGender"]);
        assert_eq!(registry.dimension_name("aAge"), Some("aAge"));
    }
}
