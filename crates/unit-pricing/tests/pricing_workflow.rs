use std::collections::BTreeMap;

use serde_json::{json, Value};
use unit_pricing::workflows::pricing::{
    ranging_from_suggestions, DistributionConfigRecord, FitRateSource, PipelineSettings,
    PricingSummary, RankedLabel, RealEstateObject, RealEstateObjectWithCalculations,
    ScoringPipeline,
};

fn object_json(static_config: Value, ranging: Value) -> Value {
    json!({
        "id": 21,
        "name": "Harbour Lofts",
        "curr": "EUR",
        "premises": [
            { "id": 1, "floor": 2, "total_area_m2": 41.5, "status": "Free",
              "number_of_rooms": 1, "customcontent": { "view": "courtyard" } },
            { "id": 2, "floor": 5, "total_area_m2": 63.0, "status": "Free",
              "number_of_rooms": 2, "customcontent": { "view": "river" } },
            { "id": 3, "floor": 8, "total_area_m2": 78.2, "status": "Free",
              "number_of_rooms": 3, "customcontent": { "view": "river" } },
            { "id": 4, "floor": 3, "total_area_m2": 55.0, "status": "Reserved",
              "number_of_rooms": 2, "customcontent": { "view": "street" } },
            { "id": 5, "floor": 7, "total_area_m2": 70.4, "status": "Sold out",
              "number_of_rooms": 3, "customcontent": { "view": "river" } }
        ],
        "pricing_configs": [
            { "id": 1, "is_active": false, "reo_id": 21, "content": {} },
            {
                "id": 2,
                "is_active": true,
                "reo_id": 21,
                "content": {
                    "staticConfig": static_config,
                    "dynamicConfig": {
                        "importantFields": { "view": true, "number_of_rooms": true, "floor": false },
                        "weights": { "view": 0.6, "number_of_rooms": 0.4 }
                    },
                    "ranging": ranging
                }
            }
        ],
        "status_mappings": [
            { "dev_status": "free", "sys_status": "available" },
            { "dev_status": "Sold out", "sys_status": "sold" }
        ]
    })
}

fn default_ranging() -> Value {
    json!({
        "view": [
            { "priority": 1, "values": ["river"] },
            { "priority": 2, "values": ["courtyard"] },
            { "priority": 3, "values": ["street"] }
        ],
        "number_of_rooms": [
            { "priority": 1, "values": [3] },
            { "priority": 2, "values": ["2"] },
            { "priority": 3, "values": ["1"] }
        ]
    })
}

fn static_config(bargain_gap: f64) -> Value {
    json!({
        "current_price_per_sqm": 5200,
        "onboarding_current_price_per_sqm": "5000",
        "minimum_liq_refusal_price": 0.85,
        "maximum_liq_refusal_price": 1.2,
        "bargainGap": bargain_gap,
        "sigma": 0.5
    })
}

fn distribution(content: Value) -> DistributionConfigRecord {
    DistributionConfigRecord {
        id: 2,
        func_name: "preset".to_string(),
        content,
        is_active: true,
        ..DistributionConfigRecord::default()
    }
}

fn context(object: Value, content: Value) -> RealEstateObjectWithCalculations {
    let object: RealEstateObject = serde_json::from_value(object).expect("object deserializes");
    RealEstateObjectWithCalculations::new(object, distribution(content))
}

fn assert_priced(context: &RealEstateObjectWithCalculations) {
    for premise in &context.premises {
        for (field, value) in premise.calculation.fields() {
            assert!(value.is_finite(), "{field} is not finite for {}", premise.unit.id);
        }
        let calculation = &premise.calculation;
        assert!(
            calculation.min_price <= calculation.final_price
                && calculation.final_price <= calculation.max_price,
            "final price {} outside [{}, {}]",
            calculation.final_price,
            calculation.min_price,
            calculation.max_price
        );
    }
}

/// Prices rise with score and at least one unit sits strictly inside its bounds.
fn assert_spread(context: &RealEstateObjectWithCalculations) {
    let prices: Vec<f64> = context
        .premises
        .iter()
        .map(|p| p.calculation.final_price)
        .collect();
    assert!(prices.windows(2).all(|pair| pair[0] <= pair[1]), "{prices:?}");
    assert!(prices.first() < prices.last(), "{prices:?}");

    let summary = PricingSummary::from_context(context);
    assert!(
        summary.units_on_bounds() < summary.priced_units,
        "every unit clamped: {prices:?}"
    );
}

#[test]
fn status_mappings_and_custom_fields_drive_scoring() {
    let context = context(
        object_json(static_config(0.0), default_ranging()),
        json!({ "function_type": "Gaussian", "mean": 0.5, "stdDev": 0.2 }),
    );

    let run = ScoringPipeline::default().execute(context);

    assert!(run.failures.is_empty(), "failures: {:?}", run.failures);
    let ids: Vec<i64> = run.context.premises.iter().map(|p| p.unit.id).collect();
    // reserved and sold units are not priced
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&4) && !ids.contains(&5));
    // a river view with three rooms is the most similar to the sold unit
    assert_eq!(ids.last(), Some(&3));
    assert_priced(&run.context);
    assert_spread(&run.context);

    let lowest = &run.context.premises[0].calculation;
    let highest = &run.context.premises[2].calculation;
    assert!((lowest.min_price - 5200.0 * 0.85).abs() < 1e-6);
    assert!((highest.max_price - 5200.0 * 1.2).abs() < 1e-6);
    assert!((highest.final_price - highest.max_price).abs() < 1e-6);
}

#[test]
fn final_prices_stay_bounded_for_any_bargain_gap() {
    for gap in [0.0, 12.5, 50.0, 100.0] {
        for curve in ["Uniform", "Gaussian", "Bimodal", "Triangular"] {
            let context = context(
                object_json(static_config(gap), default_ranging()),
                json!({ "function_type": curve }),
            );
            let context = ScoringPipeline::default().run(context);

            assert_eq!(context.premises.len(), 3, "gap {gap}, curve {curve}");
            assert_priced(&context);
            // below 15% the median unit stays above the 0.85 floor
            if gap < 15.0 {
                assert_spread(&context);
            }
        }
    }
}

#[test]
fn onboarding_rate_source_is_selectable() {
    let settings = PipelineSettings {
        fit_rate_source: FitRateSource::OnboardingPrice,
    };
    let object = object_json(static_config(5.0), default_ranging());

    let unit_based = ScoringPipeline::default().execute(context(
        object.clone(),
        json!({ "function_type": "Uniform" }),
    ));
    let onboarding = ScoringPipeline::standard(settings)
        .execute(context(object, json!({ "function_type": "Uniform" })));

    assert!(unit_based.failures.is_empty());
    assert!(onboarding.failures.is_empty());
    assert_priced(&onboarding.context);
    assert_spread(&unit_based.context);
    assert_spread(&onboarding.context);

    let fits = |run: &unit_pricing::workflows::pricing::PipelineRun| -> Vec<f64> {
        run.context
            .premises
            .iter()
            .map(|p| p.calculation.fit_conditional_value)
            .collect()
    };
    assert_ne!(fits(&unit_based), fits(&onboarding));
}

#[test]
fn ranking_suggestions_build_a_usable_ranging() {
    let label = |name: &str, value: &str, priority: i64| RankedLabel {
        name: name.to_string(),
        value: value.to_string(),
        priority,
    };
    let mut suggestions = BTreeMap::new();
    suggestions.insert(
        "view".to_string(),
        vec![
            label("view", "street", 3),
            label("view", "river", 1),
            label("view", "courtyard", 2),
        ],
    );
    suggestions.insert(
        "number_of_rooms".to_string(),
        vec![label("rooms", "3", 1), label("rooms", "2", 1), label("rooms", "1", 2)],
    );

    let ranging = serde_json::to_value(ranging_from_suggestions(&suggestions))
        .expect("ranging serializes");
    assert_eq!(ranging["view"][0], json!({ "priority": 1, "values": ["river"] }));

    let context = ScoringPipeline::default().run(context(
        object_json(static_config(0.0), ranging),
        json!({ "function_type": "Bimodal" }),
    ));

    assert_eq!(context.premises.len(), 3);
    assert_priced(&context);
    assert_spread(&context);

    let summary = PricingSummary::from_context(&context);
    assert_eq!(summary.priced_units, 3);
    assert!((summary.total_area_m2 - (41.5 + 63.0 + 78.2)).abs() < 1e-9);
    assert!(summary.estimated_revenue > 0.0);
}
