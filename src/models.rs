use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    Valid,
    Invalid,
    NoOpsData,
    InvalidFlow,
    MissingCaReadings,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::Valid => "VALID",
            QualityFlag::Invalid => "INVALID",
            QualityFlag::NoOpsData => "NO_OPS_DATA",
            QualityFlag::InvalidFlow => "INVALID_FLOW",
            QualityFlag::MissingCaReadings => "MISSING_CA_READINGS",
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityFlag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "VALID" => Ok(QualityFlag::Valid),
            "INVALID" => Ok(QualityFlag::Invalid),
            "NO_OPS_DATA" => Ok(QualityFlag::NoOpsData),
            "INVALID_FLOW" => Ok(QualityFlag::InvalidFlow),
            "MISSING_CA_READINGS" => Ok(QualityFlag::MissingCaReadings),
            other => Err(format!("unknown quality flag: {other}")),
        }
    }
}

/// Daily plant operations row. Flows are in million gallons per day.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationalRecord {
    pub plant_id: String,
    pub date: NaiveDate,
    pub actual_eff_flow_mgd: Option<f64>,
    pub actual_inf_flow_mgd: Option<f64>,
    pub max_eff_flow_mgd: Option<f64>,
    pub min_eff_flow_mgd: Option<f64>,
    pub bypass_flow_mgd: Option<f64>,
    pub bypass_hours_per_day: Option<f64>,
    pub source_file: Option<String>,
}

impl OperationalRecord {
    pub fn new(plant_id: &str, date: NaiveDate, actual_eff_flow_mgd: Option<f64>) -> Self {
        Self {
            plant_id: plant_id.to_string(),
            date,
            actual_eff_flow_mgd,
            actual_inf_flow_mgd: None,
            max_eff_flow_mgd: None,
            min_eff_flow_mgd: None,
            bypass_flow_mgd: None,
            bypass_hours_per_day: None,
            source_file: None,
        }
    }
}

/// A single lab measurement. `plant_unit_id` is the sampling location tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabReading {
    pub reading_id: Option<String>,
    pub plant_id: String,
    pub plant_unit_id: String,
    pub recorded_at: NaiveDateTime,
    pub parameter_name: String,
    pub value: f64,
    pub unit: String,
    pub uncertainty: Option<f64>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub proceed: bool,
    pub quality_flag: QualityFlag,
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn pass() -> Self {
        Self {
            proceed: true,
            quality_flag: QualityFlag::Valid,
            message: None,
        }
    }

    pub fn skip(quality_flag: QualityFlag, message: impl Into<String>) -> Self {
        Self {
            proceed: false,
            quality_flag,
            message: Some(message.into()),
        }
    }

    pub fn flagged(quality_flag: QualityFlag, message: impl Into<String>) -> Self {
        Self {
            proceed: true,
            quality_flag,
            message: Some(message.into()),
        }
    }
}

/// One derived CO2 removal result for a plant and day.
///
/// Concentrations are mg/L, `flow_mgd` is the effluent flow the calculation
/// used, and the final figure is metric tons of CO2 per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CO2RemovalRecord {
    pub plant_id: String,
    pub date: NaiveDate,
    pub ca_upstream_mg_per_l: f64,
    pub ca_downstream_mg_per_l: f64,
    pub flow_mgd: f64,
    pub ca_delta_mg_per_l: f64,
    pub flow_m3_per_day: f64,
    pub flow_l_per_day: f64,
    pub ca_to_caco3_ratio: f64,
    pub co2_to_caco3_ratio: f64,
    pub caco3_mg: f64,
    pub co2_mg: f64,
    pub co2_removed_metric_tons_per_day: f64,
    pub quality_flag: QualityFlag,
    pub quality_message: Option<String>,
    pub calculation_version: String,
}

impl CO2RemovalRecord {
    pub fn numeric_fields(&self) -> [(&'static str, f64); 11] {
        [
            ("ca_upstream_mg_per_l", self.ca_upstream_mg_per_l),
            ("ca_downstream_mg_per_l", self.ca_downstream_mg_per_l),
            ("flow_mgd", self.flow_mgd),
            ("ca_delta_mg_per_l", self.ca_delta_mg_per_l),
            ("flow_m3_per_day", self.flow_m3_per_day),
            ("flow_l_per_day", self.flow_l_per_day),
            ("ca_to_caco3_ratio", self.ca_to_caco3_ratio),
            ("co2_to_caco3_ratio", self.co2_to_caco3_ratio),
            ("caco3_mg", self.caco3_mg),
            ("co2_mg", self.co2_mg),
            (
                "co2_removed_metric_tons_per_day",
                self.co2_removed_metric_tons_per_day,
            ),
        ]
    }

    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        self.numeric_fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkSummary {
    pub plant_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_dates_considered: usize,
    pub calculated_count: usize,
    pub skipped_count: usize,
    pub quality_flags: BTreeMap<QualityFlag, usize>,
    pub skip_reasons: BTreeMap<QualityFlag, usize>,
    pub total_co2_removed_metric_tons: f64,
}

impl BulkSummary {
    pub fn average_daily_co2_removed(&self) -> f64 {
        if self.calculated_count == 0 {
            0.0
        } else {
            self.total_co2_removed_metric_tons / self.calculated_count as f64
        }
    }
}
