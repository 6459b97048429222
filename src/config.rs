use std::time::Duration;

use anyhow::Context;

use crate::mastery::MergePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub log_level: String,
    pub merge_policy: MergePolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(5);

        let acquire_timeout = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let merge_policy = match lookup("MASTERY_MERGE_POLICY") {
            Some(value) => value.parse().context("invalid MASTERY_MERGE_POLICY")?,
            None => MergePolicy::default(),
        };

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout,
            log_level,
            merge_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/math")]).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.merge_policy, MergePolicy::Blended);
    }

    #[test]
    fn database_url_is_required() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/math"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("DATABASE_ACQUIRE_TIMEOUT_SECS", "3"),
            ("MASTERY_MERGE_POLICY", "max"),
        ])
        .unwrap();
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.merge_policy, MergePolicy::Max);
    }

    #[test]
    fn rejects_unknown_policy() {
        let result = config_from(&[
            ("DATABASE_URL", "postgres://localhost/math"),
            ("MASTERY_MERGE_POLICY", "median"),
        ]);
        assert!(result.is_err());
    }
}
