// Molar masses in g/mol.
pub const MW_CA: f64 = 40.078;
pub const MW_CACO3: f64 = 100.0869;
pub const MW_CO2: f64 = 44.0095;

pub const M3_PER_MILLION_GALLONS: f64 = 3785.41;
pub const LITERS_PER_M3: f64 = 1000.0;
pub const MG_PER_METRIC_TON: f64 = 1_000_000_000.0;

/// Intermediate and final quantities of the Ca -> CaCO3 -> CO2 pathway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    pub ca_delta_mg_per_l: f64,
    pub flow_m3_per_day: f64,
    pub flow_l_per_day: f64,
    pub ca_to_caco3_ratio: f64,
    pub co2_to_caco3_ratio: f64,
    pub caco3_mg: f64,
    pub co2_mg: f64,
    pub co2_removed_metric_tons_per_day: f64,
}

impl Derivation {
    pub fn compute(flow_mgd: f64, ca_upstream: f64, ca_downstream: f64) -> Self {
        let ca_delta_mg_per_l = ca_downstream - ca_upstream;
        let flow_m3_per_day = flow_mgd * M3_PER_MILLION_GALLONS;
        let flow_l_per_day = flow_m3_per_day * LITERS_PER_M3;
        let ca_to_caco3_ratio = MW_CACO3 / MW_CA;
        let co2_to_caco3_ratio = MW_CO2 / MW_CACO3;
        let caco3_mg = ca_delta_mg_per_l * flow_l_per_day * ca_to_caco3_ratio;
        let co2_mg = caco3_mg * co2_to_caco3_ratio;

        Self {
            ca_delta_mg_per_l,
            flow_m3_per_day,
            flow_l_per_day,
            ca_to_caco3_ratio,
            co2_to_caco3_ratio,
            caco3_mg,
            co2_mg,
            co2_removed_metric_tons_per_day: co2_mg / MG_PER_METRIC_TON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_day_matches_expected_tonnage() {
        let d = Derivation::compute(31.2, 39.8, 53.7);
        assert!((d.ca_delta_mg_per_l - 13.9).abs() < 1e-9);
        assert!((d.flow_m3_per_day - 118_104.792).abs() < 1e-6);
        assert!((d.flow_l_per_day - 118_104_792.0).abs() < 1e-3);
        let expected = 1.806;
        assert!((d.co2_removed_metric_tons_per_day - expected).abs() / expected < 0.01);
    }

    #[test]
    fn ratios_collapse_to_co2_over_ca() {
        let d = Derivation::compute(1.0, 0.0, 1.0);
        let combined = d.ca_to_caco3_ratio * d.co2_to_caco3_ratio;
        assert!((combined - MW_CO2 / MW_CA).abs() < 1e-12);
        assert!((d.co2_mg - d.caco3_mg * d.co2_to_caco3_ratio).abs() < 1e-6);
    }

    #[test]
    fn negative_delta_yields_negative_removal() {
        let d = Derivation::compute(31.2, 50.0, 45.0);
        assert!((d.ca_delta_mg_per_l + 5.0).abs() < 1e-12);
        assert!(d.co2_removed_metric_tons_per_day < 0.0);
    }
}
