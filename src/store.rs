use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{CO2RemovalRecord, LabReading, OperationalRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("calculation for {plant_id} on {date} rejected: {reason}")]
    Rejected {
        plant_id: String,
        date: NaiveDate,
        reason: String,
    },
}

/// Data access needed by the calculator and the bulk orchestrator.
#[async_trait]
pub trait MrvStore: Send + Sync {
    async fn get_operational_record(
        &self,
        plant_id: &str,
        date: NaiveDate,
    ) -> Result<Option<OperationalRecord>, StoreError>;

    async fn get_lab_reading(
        &self,
        plant_id: &str,
        date: NaiveDate,
        parameter_name: &str,
        location: &str,
    ) -> Result<Option<LabReading>, StoreError>;

    async fn list_operational_dates(
        &self,
        plant_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<BTreeSet<NaiveDate>, StoreError>;

    /// Persists the batch atomically: either every record is stored or none.
    async fn save_records(&self, records: &[CO2RemovalRecord]) -> Result<(), StoreError>;
}

pub fn check_storable(record: &CO2RemovalRecord) -> Result<(), StoreError> {
    match record.first_non_finite() {
        Some((name, value)) => Err(StoreError::Rejected {
            plant_id: record.plant_id.clone(),
            date: record.date,
            reason: format!("{name} is not finite ({value})"),
        }),
        None => Ok(()),
    }
}
