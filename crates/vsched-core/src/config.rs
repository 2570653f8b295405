//! Pool settings parser.
//!
//! ```toml
//! namespace = "knative-eventing"
//! name = "dispatcher"
//! pod_capacity = 20
//! refresh_period = "10s"
//! scale_cache_refresh_period = "5m"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

fn default_refresh_period() -> String {
    "10s".to_string()
}

fn default_scale_cache_refresh_period() -> String {
    "5m".to_string()
}

/// Static settings for one autoscaled pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Namespace the pool lives in.
    pub namespace: String,
    /// Pool identity; pods are named `{name}-{ordinal}`.
    pub name: String,
    /// Virtual replicas each pod can hold.
    pub pod_capacity: u32,
    /// Control loop tick period (e.g. "10s").
    #[serde(default = "default_refresh_period")]
    pub refresh_period: String,
    /// Maximum staleness of the cached pool size (e.g. "5m").
    #[serde(default = "default_scale_cache_refresh_period")]
    pub scale_cache_refresh_period: String,
}

impl PoolSettings {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let settings: PoolSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the control loop cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.namespace.is_empty() || self.name.is_empty() {
            return Err(CoreError::InvalidSettings(
                "namespace and name must be set".to_string(),
            ));
        }
        if self.pod_capacity == 0 {
            return Err(CoreError::InvalidSettings(
                "pod_capacity must be greater than zero".to_string(),
            ));
        }
        if self.refresh_period()?.is_zero() {
            return Err(CoreError::InvalidSettings(
                "refresh_period must be greater than zero".to_string(),
            ));
        }
        if self.scale_cache_refresh_period()?.is_zero() {
            return Err(CoreError::InvalidSettings(
                "scale_cache_refresh_period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_period(&self) -> CoreResult<Duration> {
        parse_duration(&self.refresh_period)
    }

    pub fn scale_cache_refresh_period(&self) -> CoreResult<Duration> {
        parse_duration(&self.scale_cache_refresh_period)
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h", or bare seconds.
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let invalid = || CoreError::InvalidDuration(s.to_string());

    let (digits, unit_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    let millis = value.checked_mul(unit_ms).ok_or_else(invalid)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_uses_defaults() {
        let settings = PoolSettings::from_toml_str(
            r#"
namespace = "test-ns"
name = "statefulset-name"
pod_capacity = 10
"#,
        )
        .unwrap();

        assert_eq!(settings.refresh_period().unwrap(), Duration::from_secs(10));
        assert_eq!(
            settings.scale_cache_refresh_period().unwrap(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PoolSettings::from_toml_str(
            r#"
namespace = "test-ns"
name = "statefulset-name"
pod_capacity = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSettings(_)));
    }

    #[test]
    fn bad_duration_is_rejected() {
        let err = PoolSettings::from_toml_str(
            r#"
namespace = "test-ns"
name = "statefulset-name"
pod_capacity = 10
refresh_period = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDuration(_)));
    }

    #[test]
    fn from_file_reads_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "namespace = \"ns\"\nname = \"pool\"\npod_capacity = 20\nrefresh_period = \"2s\""
        )
        .unwrap();

        let settings = PoolSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.pod_capacity, 20);
        assert_eq!(settings.refresh_period().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-3s").is_err());
    }
}
