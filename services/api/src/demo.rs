use crate::infra::{read_json, SeedData};
use chrono::{TimeZone, Utc};
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use unit_pricing::config::AppConfig;
use unit_pricing::error::AppError;
use unit_pricing::workflows::pricing::{
    DistributionConfigRecord, PipelineRun, PipelineSettings, Premises, PricingConfigRecord,
    PricingSummary, RealEstateObject, RealEstateObjectWithCalculations, ScoringPipeline,
    StatusMapping, STATUS_AVAILABLE, STATUS_SOLD,
};

pub(crate) const DEMO_OBJECT_ID: i64 = 1;
pub(crate) const UNIFORM_CONFIG_ID: i64 = 1;
pub(crate) const GAUSSIAN_CONFIG_ID: i64 = 2;
pub(crate) const BIMODAL_CONFIG_ID: i64 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum DemoDistribution {
    #[default]
    Uniform,
    Gaussian,
    Bimodal,
}

impl DemoDistribution {
    fn config_id(self) -> i64 {
        match self {
            Self::Uniform => UNIFORM_CONFIG_ID,
            Self::Gaussian => GAUSSIAN_CONFIG_ID,
            Self::Bimodal => BIMODAL_CONFIG_ID,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Distribution curve used to spread prices across the ranked units
    #[arg(long, value_enum, default_value_t = DemoDistribution::Uniform)]
    pub(crate) distribution: DemoDistribution,
    /// Mark two units as sold so scoring switches to similarity against them
    #[arg(long)]
    pub(crate) with_sold: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CalculateArgs {
    /// Real-estate object JSON with premises, pricing configs and status mappings
    #[arg(long)]
    pub(crate) object: PathBuf,
    /// Distribution config JSON
    #[arg(long)]
    pub(crate) distribution: PathBuf,
    /// Optional CSV export with one row per priced unit
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

pub(crate) fn run_calculate(args: CalculateArgs) -> Result<(), AppError> {
    let CalculateArgs {
        object,
        distribution,
        csv,
    } = args;

    let config = AppConfig::load()?;
    let object: RealEstateObject = read_json(&object)?;
    let distribution: DistributionConfigRecord = read_json(&distribution)?;

    let run = price(object, distribution, config.pricing.pipeline_settings());
    render_run(&run);
    if let Some(path) = csv {
        write_csv(&path, &run.context)?;
        println!("\nWrote {} rows to {}", run.context.premises.len(), path.display());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        distribution,
        with_sold,
    } = args;

    let config = demo_distributions()
        .into_iter()
        .find(|config| config.id == distribution.config_id())
        .ok_or_else(|| AppError::Input(format!("no demo config for {distribution:?}")))?;

    println!(
        "Unit pricing demo ({:?} distribution, {} sold units)",
        distribution,
        if with_sold { 2 } else { 0 }
    );
    let run = price(demo_object(with_sold), config, PipelineSettings::default());
    render_run(&run);

    Ok(())
}

fn price(
    object: RealEstateObject,
    distribution: DistributionConfigRecord,
    settings: PipelineSettings,
) -> PipelineRun {
    let context = RealEstateObjectWithCalculations::new(object, distribution);
    ScoringPipeline::standard(settings).execute(context)
}

fn render_run(run: &PipelineRun) {
    let context = &run.context;
    println!("\n{} (id {})", context.name, context.id);
    println!(
        "{:<10} {:>5} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10}",
        "unit", "floor", "area", "rank", "fit", "min", "max", "final"
    );
    for premise in &context.premises {
        let calculation = &premise.calculation;
        println!(
            "{:<10} {:>5} {:>8.1} {:>8.3} {:>8.4} {:>10.2} {:>10.2} {:>10.2}",
            premise.unit.premises_id,
            premise.unit.floor,
            premise.unit.total_area_m2,
            calculation.normalized_rank,
            calculation.fit_conditional_value,
            calculation.min_price,
            calculation.max_price,
            calculation.final_price
        );
    }

    let summary = PricingSummary::from_context(context);
    println!("\nSummary");
    println!(
        "- {} units | {:.1} m2 | average final price {:.2}",
        summary.priced_units, summary.total_area_m2, summary.average_final_price
    );
    println!("- estimated revenue {:.2}", summary.estimated_revenue);
    println!(
        "- {} units at the lower bound, {} at the upper bound",
        summary.units_at_min_price, summary.units_at_max_price
    );

    if run.is_degraded() {
        println!("\nDegraded steps:");
        for failure in &run.failures {
            println!("  - {}: {}", failure.step, failure.error);
        }
    }
}

#[derive(Debug, Serialize)]
struct PricedUnitRow<'a> {
    reo_id: i64,
    unit_id: i64,
    premises_id: &'a str,
    floor: i64,
    total_area_m2: f64,
    scoring: f64,
    normalized_rank: f64,
    fit_conditional_value: f64,
    min_price: f64,
    max_price: f64,
    actual_price_per_sqm: f64,
    final_price: f64,
}

pub(crate) fn write_csv(
    path: &Path,
    context: &RealEstateObjectWithCalculations,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(std::io::Error::from)?;
    for premise in &context.premises {
        let calculation = &premise.calculation;
        writer
            .serialize(PricedUnitRow {
                reo_id: context.id,
                unit_id: premise.unit.id,
                premises_id: &premise.unit.premises_id,
                floor: premise.unit.floor,
                total_area_m2: premise.unit.total_area_m2,
                scoring: calculation.scoring,
                normalized_rank: calculation.normalized_rank,
                fit_conditional_value: calculation.fit_conditional_value,
                min_price: calculation.min_price,
                max_price: calculation.max_price,
                actual_price_per_sqm: calculation.actual_price_per_sqm,
                final_price: calculation.final_price,
            })
            .map_err(std::io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

/// Seed served when no `APP_SEED_PATH` is configured.
pub(crate) fn demo_seed() -> SeedData {
    SeedData {
        objects: vec![demo_object(true)],
        distribution_configs: demo_distributions(),
    }
}

fn demo_unit(id: i64, floor: i64, area: f64, rooms: i64, view: &str, status: &str) -> Premises {
    Premises {
        id,
        reo_id: DEMO_OBJECT_ID,
        uploaded: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().unwrap_or_default(),
        property_type: "flat".to_string(),
        premises_id: format!("A-{id:02}"),
        number_of_unit: id,
        number: 100 + id,
        entrance: "1".to_string(),
        floor,
        layout_type: format!("{rooms}k"),
        total_area_m2: area,
        estimated_area_m2: area,
        number_of_rooms: rooms,
        status: status.to_string(),
        customcontent: Some(json!({ "view": view })),
        ..Premises::default()
    }
}

pub(crate) fn demo_object(with_sold: bool) -> RealEstateObject {
    let sold = if with_sold { "Sold" } else { "On sale" };
    let premises = vec![
        demo_unit(1, 1, 38.4, 1, "yard", "On sale"),
        demo_unit(2, 2, 52.0, 2, "yard", "On sale"),
        demo_unit(3, 3, 64.7, 2, "park", sold),
        demo_unit(4, 4, 71.2, 3, "park", "On sale"),
        demo_unit(5, 5, 45.9, 1, "street", "On sale"),
        demo_unit(6, 6, 83.5, 3, "river", sold),
        demo_unit(7, 7, 58.3, 2, "river", "On sale"),
        demo_unit(8, 8, 96.1, 4, "river", "Reserved"),
    ];

    RealEstateObject {
        id: DEMO_OBJECT_ID,
        name: "Demo Residence".to_string(),
        curr: Some("EUR".to_string()),
        premises,
        pricing_configs: vec![PricingConfigRecord {
            id: 1,
            is_active: true,
            reo_id: DEMO_OBJECT_ID,
            content: json!({
                "staticConfig": {
                    "current_price_per_sqm": 4800,
                    "onboarding_current_price_per_sqm": "4650",
                    "minimum_liq_refusal_price": 0.9,
                    "maximum_liq_refusal_price": 1.15,
                    "bargainGap": 3,
                    "sigma": 0.6
                },
                "dynamicConfig": {
                    "importantFields": { "floor": true, "view": true, "number_of_rooms": false },
                    "weights": { "floor": 0.4, "view": 0.6 }
                },
                "ranging": {
                    "floor": [
                        { "priority": 1, "values": [7, 8] },
                        { "priority": 2, "values": [4, 5, 6] },
                        { "priority": 3, "values": [2, 3] },
                        { "priority": 4, "values": [1] }
                    ],
                    "view": [
                        { "priority": 1, "values": ["river"] },
                        { "priority": 2, "values": ["park"] },
                        { "priority": 3, "values": ["yard", "street"] }
                    ]
                }
            }),
            ..PricingConfigRecord::default()
        }],
        status_mappings: vec![
            StatusMapping {
                id: 1,
                reo_id: DEMO_OBJECT_ID,
                dev_status: "On sale".to_string(),
                sys_status: STATUS_AVAILABLE.to_string(),
            },
            StatusMapping {
                id: 2,
                reo_id: DEMO_OBJECT_ID,
                dev_status: "Sold".to_string(),
                sys_status: STATUS_SOLD.to_string(),
            },
        ],
        ..RealEstateObject::default()
    }
}

pub(crate) fn demo_distributions() -> Vec<DistributionConfigRecord> {
    let record = |id: i64, name: &str, content: serde_json::Value| DistributionConfigRecord {
        id,
        func_name: name.to_string(),
        content,
        is_active: true,
        ..DistributionConfigRecord::default()
    };

    vec![
        record(
            UNIFORM_CONFIG_ID,
            "Uniform",
            json!({ "function_type": "Uniform" }),
        ),
        record(
            GAUSSIAN_CONFIG_ID,
            "Gaussian",
            json!({ "function_type": "Gaussian", "mean": 0.5, "stdDev": 0.2 }),
        ),
        record(
            BIMODAL_CONFIG_ID,
            "Bimodal",
            json!({ "function_type": "Bimodal", "mean1": 0.3, "mean2": 0.75, "stdDev": 0.12 }),
        ),
    ]
}
