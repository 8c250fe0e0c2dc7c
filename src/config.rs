use anyhow::Context;

pub const DEFAULT_UPSTREAM_LOCATION: &str = "primary_clarifier";
pub const DEFAULT_DOWNSTREAM_LOCATION: &str = "secondary_clarifier";
pub const CALCIUM_PARAMETER: &str = "calcium";
pub const CALCULATION_VERSION: &str = "v1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct CalcSettings {
    pub calcium_parameter: String,
    pub upstream_location: String,
    pub downstream_location: String,
    pub calculation_version: String,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            calcium_parameter: CALCIUM_PARAMETER.to_string(),
            upstream_location: DEFAULT_UPSTREAM_LOCATION.to_string(),
            downstream_location: DEFAULT_DOWNSTREAM_LOCATION.to_string(),
            calculation_version: CALCULATION_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub calc: CalcSettings,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to the MRV Postgres instance")?;

        let max_connections = match lookup("MRV_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MRV_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => 5,
        };

        let defaults = CalcSettings::default();
        let calc = CalcSettings {
            upstream_location: lookup("MRV_UPSTREAM_LOCATION")
                .unwrap_or(defaults.upstream_location),
            downstream_location: lookup("MRV_DOWNSTREAM_LOCATION")
                .unwrap_or(defaults.downstream_location),
            ..CalcSettings::default()
        };

        Ok(Self {
            database_url,
            max_connections,
            calc,
        })
    }

    /// The database URL with any password replaced, safe for logs.
    pub fn redacted_database_url(&self) -> String {
        let Some((scheme, rest)) = self.database_url.split_once("://") else {
            return self.database_url.clone();
        };
        let Some((credentials, host)) = rest.split_once('@') else {
            return self.database_url.clone();
        };
        let user = credentials.split(':').next().unwrap_or_default();
        format!("{scheme}://{user}:***@{host}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn requires_database_url() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn applies_defaults_and_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://mrv:secret@db:5432/mrv"),
            ("MRV_DOWNSTREAM_LOCATION", "final_effluent"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.calc.upstream_location, DEFAULT_UPSTREAM_LOCATION);
        assert_eq!(config.calc.downstream_location, "final_effluent");
        assert_eq!(config.calc.calcium_parameter, "calcium");
    }

    #[test]
    fn rejects_bad_connection_count() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/mrv"),
            ("MRV_MAX_CONNECTIONS", "many"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn redacts_password() {
        let config = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://mrv:secret@db:5432/mrv",
        )]))
        .unwrap();
        assert_eq!(config.redacted_database_url(), "postgres://mrv:***@db:5432/mrv");

        let bare = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/mrv")]))
            .unwrap();
        assert_eq!(bare.redacted_database_url(), "postgres://db/mrv");
    }
}
