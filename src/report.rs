use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CO2RemovalRecord, QualityFlag};

#[derive(Debug, Clone, PartialEq)]
pub struct FlagSummary {
    pub quality_flag: QualityFlag,
    pub count: usize,
    pub total_co2_metric_tons: f64,
}

pub fn summarize_by_flag(records: &[CO2RemovalRecord]) -> Vec<FlagSummary> {
    let mut map: BTreeMap<QualityFlag, (usize, f64)> = BTreeMap::new();

    for record in records {
        let entry = map.entry(record.quality_flag).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.co2_removed_metric_tons_per_day;
    }

    let mut summaries: Vec<FlagSummary> = map
        .into_iter()
        .map(|(quality_flag, (count, total_co2_metric_tons))| FlagSummary {
            quality_flag,
            count,
            total_co2_metric_tons,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Removal credited in a report counts VALID days only.
pub fn valid_total(records: &[CO2RemovalRecord]) -> f64 {
    records
        .iter()
        .filter(|record| record.quality_flag == QualityFlag::Valid)
        .map(|record| record.co2_removed_metric_tons_per_day)
        .sum()
}

pub fn build_report(
    plant_id: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    records: &[CO2RemovalRecord],
) -> String {
    let summaries = summarize_by_flag(records);

    let mut output = String::new();
    let window = match (start_date, end_date) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        (Some(start), None) => format!("since {start}"),
        (None, Some(end)) => format!("through {end}"),
        (None, None) => "all recorded dates".to_string(),
    };

    let _ = writeln!(output, "# CO2 Removal Report");
    let _ = writeln!(output, "Generated for {} ({})", plant_id, window);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Quality Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No calculations recorded for this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} days ({:.3} MT CO2)",
                summary.quality_flag, summary.count, summary.total_co2_metric_tons
            );
        }
    }

    let valid_days = records
        .iter()
        .filter(|record| record.quality_flag == QualityFlag::Valid)
        .count();
    let total = valid_total(records);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Removal");
    let _ = writeln!(output, "- Total CO2 removed (VALID days): {:.2} MT", total);
    if valid_days > 0 {
        let _ = writeln!(
            output,
            "- Average daily removal: {:.4} MT/day across {} days",
            total / valid_days as f64,
            valid_days
        );
    }

    let flagged: Vec<&CO2RemovalRecord> = records
        .iter()
        .filter(|record| record.quality_flag != QualityFlag::Valid)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Flagged Days");

    if flagged.is_empty() {
        let _ = writeln!(output, "No flagged days in this window.");
    } else {
        for record in flagged {
            let _ = writeln!(
                output,
                "- {} [{}] Ca {:.2} -> {:.2} mg/L: {}",
                record.date,
                record.quality_flag,
                record.ca_upstream_mg_per_l,
                record.ca_downstream_mg_per_l,
                record.quality_message.as_deref().unwrap_or("no message")
            );
        }
    }

    output
}
