use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::calc::{self, Evaluation};
use crate::config::CalcSettings;
use crate::models::{BulkSummary, CO2RemovalRecord, QualityFlag};
use crate::store::{MrvStore, StoreError};

/// Calculates every ops date of `plant_id` within the optional inclusive
/// range, persists the successful records as one batch and summarizes.
pub async fn bulk_calculate<S>(
    store: &S,
    settings: &CalcSettings,
    plant_id: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(Vec<CO2RemovalRecord>, BulkSummary), StoreError>
where
    S: MrvStore + ?Sized,
{
    let dates = store
        .list_operational_dates(plant_id, start_date, end_date)
        .await?;
    info!(plant_id, dates = dates.len(), "starting bulk calculation");

    let mut records = Vec::new();
    let mut skip_reasons: BTreeMap<QualityFlag, usize> = BTreeMap::new();

    // BTreeSet iteration is ascending by date.
    for date in dates.iter().copied() {
        match calc::evaluate(store, settings, plant_id, date).await? {
            Evaluation::Calculated(record) => records.push(record),
            Evaluation::Skipped(outcome) => {
                *skip_reasons.entry(outcome.quality_flag).or_default() += 1;
            }
        }
    }

    let mut quality_flags: BTreeMap<QualityFlag, usize> = BTreeMap::new();
    for record in records.iter() {
        *quality_flags.entry(record.quality_flag).or_default() += 1;
    }

    store.save_records(&records).await?;

    let summary = BulkSummary {
        plant_id: plant_id.to_string(),
        start_date,
        end_date,
        total_dates_considered: dates.len(),
        calculated_count: records.len(),
        skipped_count: skip_reasons.values().sum(),
        quality_flags,
        skip_reasons,
        total_co2_removed_metric_tons: records
            .iter()
            .map(|record| record.co2_removed_metric_tons_per_day)
            .sum(),
    };

    info!(
        plant_id,
        calculated = summary.calculated_count,
        skipped = summary.skipped_count,
        "total CO2 {:.2} MT, avg daily {:.4} MT/day",
        summary.total_co2_removed_metric_tons,
        summary.average_daily_co2_removed()
    );

    Ok((records, summary))
}
