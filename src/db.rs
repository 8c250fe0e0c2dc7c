use std::collections::BTreeSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CO2RemovalRecord, LabReading, OperationalRecord};
use crate::store::{check_storable, MrvStore, StoreError};

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store over the `mrv` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MrvStore for PgStore {
    async fn get_operational_record(
        &self,
        plant_id: &str,
        date: NaiveDate,
    ) -> Result<Option<OperationalRecord>, StoreError> {
        debug!(plant_id, %date, "fetching ops record");
        let row = sqlx::query(
            r#"
            SELECT plant_id, date, actual_eff_flow_mgd, actual_inf_flow_mgd,
                   max_eff_flow_mgd, min_eff_flow_mgd, bypass_flow_mgd,
                   bypass_hours_per_day, source_file
            FROM mrv.wastewater_plant_ops
            WHERE plant_id = $1 AND date = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(plant_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| OperationalRecord {
            plant_id: row.get("plant_id"),
            date: row.get("date"),
            actual_eff_flow_mgd: row.get("actual_eff_flow_mgd"),
            actual_inf_flow_mgd: row.get("actual_inf_flow_mgd"),
            max_eff_flow_mgd: row.get("max_eff_flow_mgd"),
            min_eff_flow_mgd: row.get("min_eff_flow_mgd"),
            bypass_flow_mgd: row.get("bypass_flow_mgd"),
            bypass_hours_per_day: row.get("bypass_hours_per_day"),
            source_file: row.get("source_file"),
        }))
    }

    async fn get_lab_reading(
        &self,
        plant_id: &str,
        date: NaiveDate,
        parameter_name: &str,
        location: &str,
    ) -> Result<Option<LabReading>, StoreError> {
        debug!(plant_id, %date, parameter_name, location, "fetching lab reading");
        let row = sqlx::query(
            r#"
            SELECT reading_id, plant_id, plant_unit_id, recorded_at, parameter_name,
                   value, unit, uncertainty, source_file
            FROM mrv.lab_readings
            WHERE plant_id = $1
              AND parameter_name = $2
              AND plant_unit_id = $3
              AND recorded_at::date = $4
            ORDER BY recorded_at, id
            LIMIT 1
            "#,
        )
        .bind(plant_id)
        .bind(parameter_name)
        .bind(location)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| LabReading {
            reading_id: row.get("reading_id"),
            plant_id: row.get("plant_id"),
            plant_unit_id: row.get("plant_unit_id"),
            recorded_at: row.get("recorded_at"),
            parameter_name: row.get("parameter_name"),
            value: row.get("value"),
            unit: row.get("unit"),
            uncertainty: row.get("uncertainty"),
            source_file: row.get("source_file"),
        }))
    }

    async fn list_operational_dates(
        &self,
        plant_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<BTreeSet<NaiveDate>, StoreError> {
        let mut query =
            String::from("SELECT DISTINCT date FROM mrv.wastewater_plant_ops WHERE plant_id = $1");
        let mut position = 1;
        if start_date.is_some() {
            position += 1;
            query.push_str(&format!(" AND date >= ${position}"));
        }
        if end_date.is_some() {
            position += 1;
            query.push_str(&format!(" AND date <= ${position}"));
        }

        let mut rows = sqlx::query(&query).bind(plant_id);
        if let Some(value) = start_date {
            rows = rows.bind(value);
        }
        if let Some(value) = end_date {
            rows = rows.bind(value);
        }

        let records = rows.fetch_all(&self.pool).await?;
        Ok(records
            .iter()
            .map(|row| row.get::<NaiveDate, _>("date"))
            .collect())
    }

    async fn save_records(&self, records: &[CO2RemovalRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            check_storable(record)?;
            sqlx::query(
                r#"
                INSERT INTO mrv.co2_removal_calculations
                (id, plant_id, date, ca_upstream_mg_per_l, ca_downstream_mg_per_l, flow_mgd,
                 ca_delta_mg_per_l, flow_m3_per_day, flow_l_per_day, ca_to_caco3_ratio,
                 co2_to_caco3_ratio, caco3_mg, co2_mg, co2_removed_metric_tons_per_day,
                 quality_flag, quality_message, calculation_version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                ON CONFLICT (plant_id, date) DO UPDATE
                SET ca_upstream_mg_per_l = EXCLUDED.ca_upstream_mg_per_l,
                    ca_downstream_mg_per_l = EXCLUDED.ca_downstream_mg_per_l,
                    flow_mgd = EXCLUDED.flow_mgd,
                    ca_delta_mg_per_l = EXCLUDED.ca_delta_mg_per_l,
                    flow_m3_per_day = EXCLUDED.flow_m3_per_day,
                    flow_l_per_day = EXCLUDED.flow_l_per_day,
                    ca_to_caco3_ratio = EXCLUDED.ca_to_caco3_ratio,
                    co2_to_caco3_ratio = EXCLUDED.co2_to_caco3_ratio,
                    caco3_mg = EXCLUDED.caco3_mg,
                    co2_mg = EXCLUDED.co2_mg,
                    co2_removed_metric_tons_per_day = EXCLUDED.co2_removed_metric_tons_per_day,
                    quality_flag = EXCLUDED.quality_flag,
                    quality_message = EXCLUDED.quality_message,
                    calculation_version = EXCLUDED.calculation_version,
                    created_at = now()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&record.plant_id)
            .bind(record.date)
            .bind(record.ca_upstream_mg_per_l)
            .bind(record.ca_downstream_mg_per_l)
            .bind(record.flow_mgd)
            .bind(record.ca_delta_mg_per_l)
            .bind(record.flow_m3_per_day)
            .bind(record.flow_l_per_day)
            .bind(record.ca_to_caco3_ratio)
            .bind(record.co2_to_caco3_ratio)
            .bind(record.caco3_mg)
            .bind(record.co2_mg)
            .bind(record.co2_removed_metric_tons_per_day)
            .bind(record.quality_flag.as_str())
            .bind(&record.quality_message)
            .bind(&record.calculation_version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(saved = records.len(), "persisted CO2 removal calculations");
        Ok(())
    }
}

pub async fn fetch_calculations(
    pool: &PgPool,
    plant_id: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> anyhow::Result<Vec<CO2RemovalRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT plant_id, date, ca_upstream_mg_per_l, ca_downstream_mg_per_l, flow_mgd,
               ca_delta_mg_per_l, flow_m3_per_day, flow_l_per_day, ca_to_caco3_ratio,
               co2_to_caco3_ratio, caco3_mg, co2_mg, co2_removed_metric_tons_per_day,
               quality_flag, quality_message, calculation_version
        FROM mrv.co2_removal_calculations
        WHERE plant_id = $1
          AND ($2::date IS NULL OR date >= $2)
          AND ($3::date IS NULL OR date <= $3)
        ORDER BY date
        "#,
    )
    .bind(plant_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::new();
    for row in rows {
        let flag: String = row.get("quality_flag");
        records.push(CO2RemovalRecord {
            plant_id: row.get("plant_id"),
            date: row.get("date"),
            ca_upstream_mg_per_l: row.get("ca_upstream_mg_per_l"),
            ca_downstream_mg_per_l: row.get("ca_downstream_mg_per_l"),
            flow_mgd: row.get("flow_mgd"),
            ca_delta_mg_per_l: row.get("ca_delta_mg_per_l"),
            flow_m3_per_day: row.get("flow_m3_per_day"),
            flow_l_per_day: row.get("flow_l_per_day"),
            ca_to_caco3_ratio: row.get("ca_to_caco3_ratio"),
            co2_to_caco3_ratio: row.get("co2_to_caco3_ratio"),
            caco3_mg: row.get("caco3_mg"),
            co2_mg: row.get("co2_mg"),
            co2_removed_metric_tons_per_day: row.get("co2_removed_metric_tons_per_day"),
            quality_flag: flag.parse().map_err(anyhow::Error::msg)?,
            quality_message: row.get("quality_message"),
            calculation_version: row.get("calculation_version"),
        });
    }

    Ok(records)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let day = |d: u32| NaiveDate::from_ymd_opt(2025, 4, d).context("invalid date");

    let ops = vec![
        OperationalRecord::new("PLANT_A", day(10)?, Some(31.2)),
        OperationalRecord::new("PLANT_A", day(11)?, Some(30.4)),
        OperationalRecord::new("PLANT_A", day(12)?, Some(29.8)),
        OperationalRecord::new("PLANT_A", day(13)?, Some(0.0)),
        OperationalRecord::new("PLANT_B", day(10)?, Some(12.5)),
        OperationalRecord::new("PLANT_B", day(11)?, None),
    ];

    // reading id, plant, location, day, calcium mg/L
    let readings = vec![
        ("seed-a-10-up", "PLANT_A", "primary_clarifier", day(10)?, 39.8),
        ("seed-a-10-down", "PLANT_A", "secondary_clarifier", day(10)?, 53.7),
        ("seed-a-11-up", "PLANT_A", "primary_clarifier", day(11)?, 50.0),
        ("seed-a-11-down", "PLANT_A", "secondary_clarifier", day(11)?, 45.0),
        ("seed-a-12-up", "PLANT_A", "primary_clarifier", day(12)?, 41.3),
        ("seed-a-13-up", "PLANT_A", "primary_clarifier", day(13)?, 40.1),
        ("seed-a-13-down", "PLANT_A", "secondary_clarifier", day(13)?, 52.6),
        ("seed-b-10-up", "PLANT_B", "primary_clarifier", day(10)?, 41.2),
        ("seed-b-10-down", "PLANT_B", "secondary_clarifier", day(10)?, 48.9),
        ("seed-b-11-up", "PLANT_B", "primary_clarifier", day(11)?, 40.7),
        ("seed-b-11-down", "PLANT_B", "secondary_clarifier", day(11)?, 47.5),
    ];

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM mrv.wastewater_plant_ops WHERE source_file = 'seed'")
        .execute(&mut *tx)
        .await?;

    for row in ops.iter() {
        insert_ops(&mut tx, row, "seed").await?;
    }

    for (reading_id, plant_id, location, date, value) in readings {
        let recorded_at = date.and_hms_opt(9, 0, 0).context("invalid time")?;
        sqlx::query(
            r#"
            INSERT INTO mrv.lab_readings
            (reading_id, plant_id, plant_unit_id, recorded_at, parameter_name, value, unit, source_file)
            VALUES ($1, $2, $3, $4, 'calcium', $5, 'mg/L', 'seed')
            ON CONFLICT (reading_id) DO NOTHING
            "#,
        )
        .bind(reading_id)
        .bind(plant_id)
        .bind(location)
        .bind(recorded_at)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_ops(
    conn: &mut PgConnection,
    row: &OperationalRecord,
    source_file: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO mrv.wastewater_plant_ops
        (plant_id, date, actual_eff_flow_mgd, actual_inf_flow_mgd, max_eff_flow_mgd,
         min_eff_flow_mgd, bypass_flow_mgd, bypass_hours_per_day, source_file)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&row.plant_id)
    .bind(row.date)
    .bind(row.actual_eff_flow_mgd)
    .bind(row.actual_inf_flow_mgd)
    .bind(row.max_eff_flow_mgd)
    .bind(row.min_eff_flow_mgd)
    .bind(row.bypass_flow_mgd)
    .bind(row.bypass_hours_per_day)
    .bind(source_file)
    .execute(conn)
    .await?;
    Ok(())
}

/// Loads every row of the file in one transaction.
pub async fn import_ops_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let default_source = csv_path.display().to_string();
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<OperationalRecord>() {
        let row = result?;
        let source_file = row.source_file.as_deref().unwrap_or(&default_source);
        insert_ops(&mut tx, &row, source_file).await?;
        inserted += 1;
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Loads every row of the file in one transaction.
pub async fn import_readings_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<LabReading>() {
        let row = result?;
        let reading_id = row
            .reading_id
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let source_file = row
            .source_file
            .clone()
            .unwrap_or_else(|| csv_path.display().to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO mrv.lab_readings
            (reading_id, plant_id, plant_unit_id, recorded_at, parameter_name, value, unit,
             uncertainty, source_file)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (reading_id) DO NOTHING
            "#,
        )
        .bind(reading_id)
        .bind(&row.plant_id)
        .bind(&row.plant_unit_id)
        .bind(row.recorded_at)
        .bind(&row.parameter_name)
        .bind(row.value)
        .bind(&row.unit)
        .bind(row.uncertainty)
        .bind(source_file)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}
