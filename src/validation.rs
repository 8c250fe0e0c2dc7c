use chrono::NaiveDate;
use tracing::warn;

use crate::models::{
    CO2RemovalRecord, LabReading, OperationalRecord, QualityFlag, ValidationOutcome,
};

/// Inputs that cleared the blocking gates, with the delta outcome to stamp
/// on the record.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedInputs {
    pub flow_mgd: f64,
    pub ca_upstream: f64,
    pub ca_downstream: f64,
    pub outcome: ValidationOutcome,
}

/// Usable effluent flow: present, finite and strictly positive.
pub fn checked_flow(
    ops: Option<&OperationalRecord>,
    plant_id: &str,
    date: NaiveDate,
) -> Result<f64, ValidationOutcome> {
    let Some(ops) = ops else {
        warn!(plant_id, %date, "no ops data found");
        return Err(ValidationOutcome::skip(
            QualityFlag::NoOpsData,
            "No operational data found",
        ));
    };

    match ops.actual_eff_flow_mgd {
        Some(flow) if flow.is_finite() && flow > 0.0 => Ok(flow),
        flow => {
            warn!(plant_id, %date, ?flow, "missing or invalid effluent flow");
            let shown = flow.map_or_else(|| "none".to_string(), |value| value.to_string());
            Err(ValidationOutcome::skip(
                QualityFlag::InvalidFlow,
                format!("Flow data invalid: {shown}"),
            ))
        }
    }
}

/// Upstream and downstream calcium values, both present and finite.
pub fn checked_calcium(
    upstream: Option<&LabReading>,
    downstream: Option<&LabReading>,
    plant_id: &str,
    date: NaiveDate,
) -> Result<(f64, f64), ValidationOutcome> {
    let (Some(up), Some(down)) = (upstream, downstream) else {
        let mut missing = Vec::new();
        if upstream.is_none() {
            missing.push("upstream");
        }
        if downstream.is_none() {
            missing.push("downstream");
        }
        let sides = missing.join(", ");
        warn!(plant_id, %date, missing = %sides, "missing calcium readings");
        return Err(ValidationOutcome::skip(
            QualityFlag::MissingCaReadings,
            format!("Missing {sides} calcium readings"),
        ));
    };

    let unusable: Vec<String> = [("upstream", up.value), ("downstream", down.value)]
        .into_iter()
        .filter(|(_, value)| !value.is_finite())
        .map(|(side, value)| format!("{side}={value}"))
        .collect();
    if !unusable.is_empty() {
        let sides = unusable.join(", ");
        warn!(plant_id, %date, values = %sides, "non-finite calcium readings");
        return Err(ValidationOutcome::skip(
            QualityFlag::MissingCaReadings,
            format!("Unusable calcium readings: {sides}"),
        ));
    }

    Ok((up.value, down.value))
}

pub fn validate_ops(
    ops: Option<&OperationalRecord>,
    plant_id: &str,
    date: NaiveDate,
) -> ValidationOutcome {
    checked_flow(ops, plant_id, date).map_or_else(|outcome| outcome, |_| ValidationOutcome::pass())
}

#[allow(dead_code)]
pub fn validate_readings(
    upstream: Option<&LabReading>,
    downstream: Option<&LabReading>,
    plant_id: &str,
    date: NaiveDate,
) -> ValidationOutcome {
    checked_calcium(upstream, downstream, plant_id, date)
        .map_or_else(|outcome| outcome, |_| ValidationOutcome::pass())
}

/// Never blocks a calculation; a non-positive delta only downgrades the flag.
pub fn validate_delta(
    ca_upstream: f64,
    ca_downstream: f64,
    plant_id: &str,
    date: NaiveDate,
) -> ValidationOutcome {
    let ca_delta = ca_downstream - ca_upstream;
    if ca_delta > 0.0 {
        return ValidationOutcome::pass();
    }

    warn!(
        plant_id,
        %date,
        ca_upstream,
        ca_downstream,
        "non-positive ca_delta {:.4}",
        ca_delta
    );
    ValidationOutcome::flagged(
        QualityFlag::Invalid,
        format!("Non-positive ca_delta: {ca_delta:.4}"),
    )
}

/// Ops gate, then readings gate, each short-circuiting; the delta check runs
/// last on the values the gates handed over.
pub fn check_inputs(
    ops: Option<&OperationalRecord>,
    upstream: Option<&LabReading>,
    downstream: Option<&LabReading>,
    plant_id: &str,
    date: NaiveDate,
) -> Result<CheckedInputs, ValidationOutcome> {
    let flow_mgd = checked_flow(ops, plant_id, date)?;
    let (ca_upstream, ca_downstream) = checked_calcium(upstream, downstream, plant_id, date)?;
    let outcome = validate_delta(ca_upstream, ca_downstream, plant_id, date);

    Ok(CheckedInputs {
        flow_mgd,
        ca_upstream,
        ca_downstream,
        outcome,
    })
}

/// Outcome-only view of [`check_inputs`].
#[allow(dead_code)]
pub fn validate_all(
    ops: Option<&OperationalRecord>,
    upstream: Option<&LabReading>,
    downstream: Option<&LabReading>,
    plant_id: &str,
    date: NaiveDate,
) -> ValidationOutcome {
    match check_inputs(ops, upstream, downstream, plant_id, date) {
        Ok(inputs) => inputs.outcome,
        Err(outcome) => outcome,
    }
}

/// Finite inputs can still overflow once scaled to litres per day.
pub fn validate_derived(record: &CO2RemovalRecord) -> ValidationOutcome {
    let Some((name, value)) = record.first_non_finite() else {
        return ValidationOutcome::pass();
    };

    warn!(
        plant_id = %record.plant_id,
        date = %record.date,
        field = name,
        "derived value out of range"
    );
    ValidationOutcome::skip(
        QualityFlag::Invalid,
        format!("Derived {name} is not finite ({value})"),
    )
}
