//! Cross-module scenarios, run through the same steps a caller would take:
//! validate, expand, synchronize, index the response, pivot, generate.

use crate::*;
use serde_json::json;

fn registry() -> DimensionRegistry {
    DimensionRegistry::with_builtins()
}

fn config() -> serde_json::Value {
    json!({
        "type": "stackedcolumn",
        "columns": [{"dimension": "dx", "items": [
            {"id": "Uvn6LCg7dVU"},
            {"id": "OdiHJayrsKo"},
        ]}],
        "rows": [{"dimension": "pe", "items": [{"id": "LAST_3_MONTHS"}]}],
        "filters": [{"dimension": "ou", "items": [{"id": "USER_ORGUNIT"}]}],
        "showTrendLine": true,
    })
}

fn metadata_payload() -> serde_json::Value {
    json!({
        "metaData": {
            "names": {
                "Uvn6LCg7dVU": "ANC 1 Coverage",
                "OdiHJayrsKo": "ANC 2 Coverage",
                "201601": "January 2016",
                "201602": "February 2016",
                "201603": "March 2016",
                "ImspTQPwCqd": "Sierra Leone",
            },
            "dx": ["Uvn6LCg7dVU", "OdiHJayrsKo"],
            "pe": ["201601", "201602", "201603"],
            "ou": ["ImspTQPwCqd"],
        },
    })
}

fn data_payload() -> serde_json::Value {
    json!({
        "headers": [
            {"name": "dx", "meta": true},
            {"name": "pe", "meta": true},
            {"name": "value", "meta": false},
        ],
        "rows": [
            ["Uvn6LCg7dVU", "201601", "10"],
            ["Uvn6LCg7dVU", "201602", "20"],
            ["Uvn6LCg7dVU", "201603", "30"],
            ["OdiHJayrsKo", "201601", "5"],
            ["OdiHJayrsKo", "201602", "10"],
            ["OdiHJayrsKo", "201603", "15"],
        ],
    })
}

#[test]
fn end_to_end_stacked_column() {
    let registry = registry();
    let layout = Layout::from_value(&config(), &registry).unwrap();
    let xlayout = XLayout::from_layout(&layout, &registry).unwrap();

    // Metadata request keeps layout order and skips data.
    let meta_query = AnalyticsQuery::metadata(&xlayout, &UserContext::default());
    assert_eq!(
        meta_query.to_query_string(),
        "?dimension=dx:Uvn6LCg7dVU;OdiHJayrsKo&dimension=pe:LAST_3_MONTHS\
         &filter=ou:USER_ORGUNIT&displayProperty=NAME&skipData=true"
    );

    // Server metadata resolves the relative period and user org unit.
    let meta = MetaData::from_value(&metadata_payload()["metaData"]);
    let xlayout = synchronized_xlayout(&xlayout, &meta, &registry).unwrap();
    assert_eq!(xlayout.ids_for("pe"), ["201601", "201602", "201603"]);
    assert_eq!(xlayout.ids_for("ou"), ["ImspTQPwCqd"]);

    // Data request is sorted for cacheability and skips metadata.
    let data_query = AnalyticsQuery::data(&xlayout, &UserContext::default());
    let qs = data_query.to_query_string();
    assert!(qs.contains("dimension=dx:OdiHJayrsKo;Uvn6LCg7dVU"));
    assert!(qs.contains("dimension=pe:201601;201602;201603"));
    assert!(qs.ends_with("&skipMeta=true"));

    // Data rows come back without metadata; the first response supplies it.
    let response = AnalyticsResponse::from_value(&data_payload())
        .unwrap()
        .with_meta_data(meta);
    let xresponse = XResponse::build(&xlayout, response).unwrap();

    let options = ChartOptions::default();
    let ctx = ChartContext {
        xlayout: &xlayout,
        xresponse: &xresponse,
        legend_set: None,
        options: &options,
    };
    let model = GeneratorRegistry::with_defaults().generate(&ctx).unwrap();

    assert_eq!(model.kind, ChartKind::StackedColumn);
    assert_eq!(model.store.records.len(), 3);
    assert_eq!(model.store.records[0].domain, "January 2016");

    let total = model.store.total_field.as_ref().unwrap();
    assert_eq!(model.store.records[2].value(total), Some(45.0));

    // One trend series over the totals, since the store is stacked.
    let trend = model
        .series
        .iter()
        .find(|s| s.role == SeriesRole::Trend)
        .unwrap();
    assert_eq!(trend.titles, ["Trend (Total)"]);
    let trend_field = &trend.fields[0];
    // Totals 15, 30, 45 lie on an exact line.
    assert_eq!(model.store.records[0].value(trend_field), Some(15.0));
    assert_eq!(model.store.records[2].value(trend_field), Some(45.0));

    let data = model
        .series
        .iter()
        .find(|s| s.role == SeriesRole::Data)
        .unwrap();
    assert!(data.stacked);
    assert_eq!(data.titles, ["ANC 1 Coverage", "ANC 2 Coverage"]);
}

#[test]
fn category_disaggregated_response_stays_addressable() {
    let registry = registry();
    let layout = Layout::from_value(&config(), &registry).unwrap();
    let xlayout = XLayout::from_layout(&layout, &registry).unwrap();

    let payload = json!({
        "headers": [
            {"name": "dx", "meta": true},
            {"name": "co", "meta": true},
            {"name": "pe", "meta": true},
            {"name": "value", "meta": false},
        ],
        "rows": [
            ["Uvn6LCg7dVU", "catA", "201601", "4"],
            ["Uvn6LCg7dVU", "catB", "201601", "6"],
        ],
    });
    let response = AnalyticsResponse::from_value(&payload).unwrap();
    let xresponse = XResponse::build(&xlayout, response).unwrap();

    let key = DataKey::new(vec![
        "Uvn6LCg7dVU".into(),
        "catA".into(),
        "201601".into(),
    ]);
    assert_eq!(xresponse.lookup(&key), Some("4"));
    // A totals probe does not hit disaggregated rows.
    assert_eq!(xresponse.value(&["Uvn6LCg7dVU", "201601"]), None);
}

#[test]
fn validation_failures_carry_user_facing_messages() {
    let registry = registry();
    let mut bad = config();
    bad["filters"] = json!([{"dimension": "in", "items": [{"id": "x"}]}]);

    let err = Layout::from_value(&bad, &registry).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Indicators cannot be specified as filter");
}

#[test]
fn dynamic_dimensions_flow_through_the_pipeline() {
    let mut registry = registry();
    registry.register_dynamic("J5jldMd8OHv", "Facility type");

    let config = json!({
        "type": "column",
        "columns": [{"dimension": "J5jldMd8OHv", "items": [
            {"id": "clinic", "name": "Clinic"},
            {"id": "hospital", "name": "Hospital"},
        ]}],
        "rows": [{"dimension": "pe", "items": [{"id": "2016"}]}],
        "filters": [{"dimension": "ou", "items": [{"id": "root"}]}],
    });
    let layout = Layout::from_value(&config, &registry).unwrap();
    let xlayout = XLayout::from_layout(&layout, &registry).unwrap();

    assert_eq!(xlayout.column_dimension_names, ["J5jldMd8OHv"]);
    let qs = AnalyticsQuery::metadata(&xlayout, &UserContext::default()).to_query_string();
    assert!(qs.contains("dimension=J5jldMd8OHv:clinic;hospital"));

    let payload = json!({
        "headers": [
            {"name": "J5jldMd8OHv", "meta": true},
            {"name": "pe", "meta": true},
            {"name": "value", "meta": false},
        ],
        "metaData": {"names": {"2016": "2016"}},
        "rows": [
            ["clinic", "2016", "7"],
            ["hospital", "2016", "9"],
        ],
    });
    let response = AnalyticsResponse::from_value(&payload).unwrap();
    let xresponse = XResponse::build(&xlayout, response).unwrap();
    assert_eq!(xresponse.value(&["hospital", "2016"]), Some("9"));
}
