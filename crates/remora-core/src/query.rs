//! Analytics request assembly.
//!
//! Two requests serve one chart: a metadata request (`skipData=true`) in
//! layout order, and a data request (`skipMeta=true`) with dimension names
//! and ids sorted so equivalent selections share a cache key.

use crate::dimension;
use crate::layout::{AggregationType, DisplayProperty};
use crate::xlayout::XLayout;

/// Per-request user context: the authenticated user id (substituted for
/// user-relative org unit selections server-side) and an account-level
/// display property that overrides the layout's.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub id: Option<String>,
    pub display_property: Option<DisplayProperty>,
}

/// An assembled analytics request as an ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    params: Vec<(String, String)>,
}

fn dedup(ids: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id.as_str()) {
            out.push(id);
        }
    }
    out
}

fn dimension_value(name: &str, ids: &[String]) -> String {
    if name == dimension::CATEGORY {
        // Category disaggregations are implied; the dimension is named bare.
        return name.to_owned();
    }
    let ids = if name == dimension::DATA {
        dedup(ids)
    } else {
        ids.iter().map(String::as_str).collect()
    };
    format!("{name}:{}", ids.join(";"))
}

impl AnalyticsQuery {
    /// The metadata request: layout order, `skipData=true`.
    pub fn metadata(xlayout: &XLayout, user: &UserContext) -> Self {
        let mut params = Self::common_params(xlayout, user, false);
        params.push(("skipData".to_owned(), "true".to_owned()));
        Self { params }
    }

    /// The data request: sorted names and ids, `skipMeta=true`.
    pub fn data(xlayout: &XLayout, user: &UserContext) -> Self {
        let mut params = Self::common_params(xlayout, user, true);
        params.push(("skipMeta".to_owned(), "true".to_owned()));
        Self { params }
    }

    fn common_params(xlayout: &XLayout, user: &UserContext, sorted: bool) -> Vec<(String, String)> {
        let layout = &xlayout.layout;
        let mut params: Vec<(String, String)> = Vec::new();

        let axis_names = if sorted {
            &xlayout.sorted_axis_dimension_names
        } else {
            &xlayout.axis_dimension_names
        };
        let ids_map = if sorted {
            &xlayout.dimension_name_sorted_ids_map
        } else {
            &xlayout.dimension_name_ids_map
        };

        for name in axis_names {
            let ids = ids_map.get(name).map(Vec::as_slice).unwrap_or(&[]);
            params.push(("dimension".to_owned(), dimension_value(name, ids)));
        }

        let mut filter_names = xlayout.filter_dimension_names.clone();
        if sorted {
            filter_names.sort();
        }
        for name in &filter_names {
            let ids = ids_map.get(name).map(Vec::as_slice).unwrap_or(&[]);
            params.push(("filter".to_owned(), dimension_value(name, ids)));
        }

        if layout.completed_only {
            params.push(("completedOnly".to_owned(), "true".to_owned()));
        }
        if layout.aggregation_type != AggregationType::Default {
            params.push((
                "aggregationType".to_owned(),
                layout.aggregation_type.as_str().to_owned(),
            ));
        }

        let display_property = user.display_property.unwrap_or(layout.display_property);
        params.push((
            "displayProperty".to_owned(),
            display_property.as_param().to_owned(),
        ));

        if !layout.user_org_unit.is_empty() {
            params.push(("userOrgUnit".to_owned(), layout.user_org_unit.join(";")));
        }
        if let Some(date) = &layout.relative_period_date {
            params.push(("relativePeriodDate".to_owned(), date.clone()));
        }

        let user_relative_ou = xlayout
            .ids_for(dimension::ORG_UNIT)
            .iter()
            .any(|id| id.starts_with("USER_ORGUNIT"));
        if user_relative_ou {
            if let Some(id) = &user.id {
                params.push(("user".to_owned(), id.clone()));
            }
        }

        params
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Query-string form. Operand ids embed `#`, which is not query-safe, so
    /// every `#` is rewritten to `.` as the server expects.
    pub fn to_query_string(&self) -> String {
        let joined = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{joined}").replace('#', ".")
    }
}
