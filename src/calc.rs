use chrono::NaiveDate;
use tracing::{debug, info};

use crate::chemistry::Derivation;
use crate::config::CalcSettings;
use crate::models::{CO2RemovalRecord, QualityFlag, ValidationOutcome};
use crate::store::{MrvStore, StoreError};
use crate::validation;

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Calculated(CO2RemovalRecord),
    Skipped(ValidationOutcome),
}

/// Joins ops and calcium readings for one plant-day and derives the removal
/// record, or reports why the day was skipped.
pub async fn evaluate<S>(
    store: &S,
    settings: &CalcSettings,
    plant_id: &str,
    date: NaiveDate,
) -> Result<Evaluation, StoreError>
where
    S: MrvStore + ?Sized,
{
    let ops = store.get_operational_record(plant_id, date).await?;

    // Readings are only worth fetching once the ops gate has passed.
    let ops_outcome = validation::validate_ops(ops.as_ref(), plant_id, date);
    if !ops_outcome.proceed {
        return Ok(Evaluation::Skipped(ops_outcome));
    }

    let upstream = store
        .get_lab_reading(
            plant_id,
            date,
            &settings.calcium_parameter,
            &settings.upstream_location,
        )
        .await?;
    let downstream = store
        .get_lab_reading(
            plant_id,
            date,
            &settings.calcium_parameter,
            &settings.downstream_location,
        )
        .await?;
    debug!(
        plant_id,
        %date,
        has_upstream = upstream.is_some(),
        has_downstream = downstream.is_some(),
        "fetched calcium readings"
    );

    let inputs = match validation::check_inputs(
        ops.as_ref(),
        upstream.as_ref(),
        downstream.as_ref(),
        plant_id,
        date,
    ) {
        Ok(inputs) => inputs,
        Err(outcome) => return Ok(Evaluation::Skipped(outcome)),
    };

    let record = build_record(
        settings,
        plant_id,
        date,
        inputs.flow_mgd,
        inputs.ca_upstream,
        inputs.ca_downstream,
        inputs.outcome,
    );
    let derived = validation::validate_derived(&record);
    if !derived.proceed {
        return Ok(Evaluation::Skipped(derived));
    }

    let symbol = if record.quality_flag == QualityFlag::Valid { "✓" } else { "⚠" };
    info!(
        plant_id,
        %date,
        flag = %record.quality_flag,
        "{symbol} CO2={:.6} MT/day",
        record.co2_removed_metric_tons_per_day
    );

    Ok(Evaluation::Calculated(record))
}

/// Returns the record for the plant-day, or `None` when validation skipped it.
pub async fn calculate<S>(
    store: &S,
    settings: &CalcSettings,
    plant_id: &str,
    date: NaiveDate,
) -> Result<Option<CO2RemovalRecord>, StoreError>
where
    S: MrvStore + ?Sized,
{
    match evaluate(store, settings, plant_id, date).await? {
        Evaluation::Calculated(record) => Ok(Some(record)),
        Evaluation::Skipped(_) => Ok(None),
    }
}

pub fn build_record(
    settings: &CalcSettings,
    plant_id: &str,
    date: NaiveDate,
    flow_mgd: f64,
    ca_upstream: f64,
    ca_downstream: f64,
    outcome: ValidationOutcome,
) -> CO2RemovalRecord {
    let d = Derivation::compute(flow_mgd, ca_upstream, ca_downstream);

    CO2RemovalRecord {
        plant_id: plant_id.to_string(),
        date,
        ca_upstream_mg_per_l: ca_upstream,
        ca_downstream_mg_per_l: ca_downstream,
        flow_mgd,
        ca_delta_mg_per_l: d.ca_delta_mg_per_l,
        flow_m3_per_day: d.flow_m3_per_day,
        flow_l_per_day: d.flow_l_per_day,
        ca_to_caco3_ratio: d.ca_to_caco3_ratio,
        co2_to_caco3_ratio: d.co2_to_caco3_ratio,
        caco3_mg: d.caco3_mg,
        co2_mg: d.co2_mg,
        co2_removed_metric_tons_per_day: d.co2_removed_metric_tons_per_day,
        quality_flag: outcome.quality_flag,
        quality_message: outcome.message,
        calculation_version: settings.calculation_version.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabReading, OperationalRecord};
    use crate::store::memory::MemoryStore;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()
    }

    fn calcium(location: &str, hour: u32, value: f64) -> LabReading {
        LabReading {
            reading_id: None,
            plant_id: "PLANT_A".to_string(),
            plant_unit_id: location.to_string(),
            recorded_at: day().and_hms_opt(hour, 30, 0).unwrap(),
            parameter_name: "calcium".to_string(),
            value,
            unit: "mg/L".to_string(),
            uncertainty: None,
            source_file: None,
        }
    }

    fn store_with(flow: Option<f64>, upstream: Option<f64>, downstream: Option<f64>) -> MemoryStore {
        let mut store = MemoryStore {
            ops: vec![OperationalRecord::new("PLANT_A", day(), flow)],
            ..MemoryStore::default()
        };
        if let Some(value) = upstream {
            store.readings.push(calcium("primary_clarifier", 8, value));
        }
        if let Some(value) = downstream {
            store.readings.push(calcium("secondary_clarifier", 9, value));
        }
        store
    }

    #[tokio::test]
    async fn reference_day_is_valid() {
        let store = store_with(Some(31.2), Some(39.8), Some(53.7));
        let record = calculate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap()
            .expect("record");

        assert_eq!(record.plant_id, "PLANT_A");
        assert_eq!(record.date, day());
        assert_eq!(record.flow_mgd, 31.2);
        assert!((record.ca_delta_mg_per_l - 13.9).abs() < 1e-9);
        assert_eq!(record.quality_flag, QualityFlag::Valid);
        assert_eq!(record.quality_message, None);
        assert_eq!(record.calculation_version, "v1.0");
        let expected = 1.806;
        assert!((record.co2_removed_metric_tons_per_day - expected).abs() / expected < 0.01);
    }

    #[tokio::test]
    async fn falling_calcium_is_kept_but_flagged() {
        let store = store_with(Some(31.2), Some(50.0), Some(45.0));
        let record = calculate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap()
            .expect("record");

        assert_eq!(record.ca_delta_mg_per_l, -5.0);
        assert_eq!(record.quality_flag, QualityFlag::Invalid);
        assert!(record.quality_message.is_some());
        assert!(record.co2_removed_metric_tons_per_day < 0.0);
    }

    #[tokio::test]
    async fn zero_flow_is_skipped() {
        let store = store_with(Some(0.0), Some(39.8), Some(53.7));
        let result = evaluate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        match result {
            Evaluation::Skipped(outcome) => {
                assert_eq!(outcome.quality_flag, QualityFlag::InvalidFlow)
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_reading_is_skipped() {
        let store = store_with(Some(31.2), Some(39.8), None);
        let result = calculate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_ops_is_skipped() {
        let store = MemoryStore::default();
        let result = evaluate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        assert_eq!(
            result,
            Evaluation::Skipped(ValidationOutcome::skip(
                QualityFlag::NoOpsData,
                "No operational data found"
            ))
        );
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let store = store_with(Some(12.5), Some(41.0), Some(47.3));
        let settings = CalcSettings::default();
        let first = calculate(&store, &settings, "PLANT_A", day()).await.unwrap();
        let second = calculate(&store, &settings, "PLANT_A", day()).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn earliest_reading_of_the_day_wins() {
        let mut store = store_with(Some(10.0), Some(40.0), Some(45.0));
        store.readings.push(calcium("primary_clarifier", 6, 38.0));
        let record = calculate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap()
            .expect("record");
        assert_eq!(record.ca_upstream_mg_per_l, 38.0);
    }

    #[tokio::test]
    async fn honours_configured_locations() {
        let mut store = store_with(Some(10.0), Some(40.0), None);
        store.readings.push(calcium("final_effluent", 10, 44.0));
        let settings = CalcSettings {
            downstream_location: "final_effluent".to_string(),
            ..CalcSettings::default()
        };
        let record = calculate(&store, &settings, "PLANT_A", day())
            .await
            .unwrap()
            .expect("record");
        assert_eq!(record.ca_downstream_mg_per_l, 44.0);
    }

    #[tokio::test]
    async fn infinite_flow_is_skipped() {
        let store = store_with(Some(f64::INFINITY), Some(39.8), Some(53.7));
        let result = evaluate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        match result {
            Evaluation::Skipped(outcome) => {
                assert_eq!(outcome.quality_flag, QualityFlag::InvalidFlow)
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nan_reading_is_skipped() {
        let store = store_with(Some(31.2), Some(f64::NAN), Some(53.7));
        let result = evaluate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        match result {
            Evaluation::Skipped(outcome) => {
                assert_eq!(outcome.quality_flag, QualityFlag::MissingCaReadings)
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overflowing_flow_never_yields_a_record() {
        let store = store_with(Some(1e302), Some(39.8), Some(53.7));
        let result = evaluate(&store, &CalcSettings::default(), "PLANT_A", day())
            .await
            .unwrap();
        match result {
            Evaluation::Skipped(outcome) => {
                assert!(!outcome.proceed);
                assert_eq!(outcome.quality_flag, QualityFlag::Invalid);
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }
}
