use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, MonitorError};

pub const DEFAULT_WARNING_DELAY: Duration = Duration::from_millis(120_000);
pub const DEFAULT_LOGOUT_DELAY: Duration = Duration::from_millis(180_000);
/// Longest accepted delay; countdowns are reported in `u64` milliseconds
pub const MAX_DELAY: Duration = Duration::from_millis(u64::MAX);

/// Idle timing for one monitor instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdleSettings {
    /// Inactivity before the warning is raised
    #[serde(rename = "warning_delay_ms", with = "duration_ms")]
    pub warning_delay: Duration,
    /// Inactivity before the session is signed out; must exceed `warning_delay`
    #[serde(rename = "logout_delay_ms", with = "duration_ms")]
    pub logout_delay: Duration,
    pub enabled: bool,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            warning_delay: DEFAULT_WARNING_DELAY,
            logout_delay: DEFAULT_LOGOUT_DELAY,
            enabled: true,
        }
    }
}

impl IdleSettings {
    pub fn new(warning_delay: Duration, logout_delay: Duration) -> Self {
        Self {
            warning_delay,
            logout_delay,
            enabled: true,
        }
    }

    pub fn from_millis(warning_ms: u64, logout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(warning_ms),
            Duration::from_millis(logout_ms),
        )
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Length of the visible countdown
    pub fn grace_period(&self) -> Duration {
        self.logout_delay.saturating_sub(self.warning_delay)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let reason = if self.warning_delay.is_zero() {
            Some("warning delay must be positive")
        } else if self.logout_delay.is_zero() {
            Some("logout delay must be positive")
        } else if self.logout_delay > MAX_DELAY {
            Some("delays must fit in u64 milliseconds")
        } else if self.logout_delay <= self.warning_delay {
            Some("logout delay must exceed warning delay")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(MonitorError::InvalidConfiguration {
                warning_delay: self.warning_delay,
                logout_delay: self.logout_delay,
                reason,
            }),
            None => Ok(()),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

pub trait ConfigStore {
    fn load(&self) -> IdleSettings;
    fn save(&self, settings: &IdleSettings) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "idlewarden") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("idlewarden_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> IdleSettings {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return IdleSettings::default(),
        };
        match serde_json::from_slice::<IdleSettings>(&bytes) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "unreadable config, using defaults");
                IdleSettings::default()
            }
        }
    }

    fn save(&self, settings: &IdleSettings) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let settings = IdleSettings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn missing_or_corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), IdleSettings::default());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), IdleSettings::default());
    }

    #[test]
    fn stored_as_milliseconds() {
        let json = serde_json::to_value(IdleSettings::from_millis(2000, 3000).disabled()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "warning_delay_ms": 2000,
                "logout_delay_ms": 3000,
                "enabled": false
            })
        );
    }

    #[test]
    fn validate_rejects_bad_delays() {
        assert!(IdleSettings::default().validate().is_ok());
        assert_matches!(
            IdleSettings::from_millis(0, 3000).validate(),
            Err(MonitorError::InvalidConfiguration { reason, .. }) if reason.contains("warning")
        );
        assert_matches!(
            IdleSettings::from_millis(2000, 0).validate(),
            Err(MonitorError::InvalidConfiguration { .. })
        );
        assert_matches!(
            IdleSettings::from_millis(2000, 2000).validate(),
            Err(MonitorError::InvalidConfiguration { reason, .. }) if reason.contains("exceed")
        );
        assert_matches!(
            IdleSettings::from_millis(3000, 2000).validate(),
            Err(MonitorError::InvalidConfiguration { .. })
        );
        assert_matches!(
            IdleSettings::new(
                Duration::from_secs(u64::MAX - 1),
                Duration::from_secs(u64::MAX)
            )
            .validate(),
            Err(MonitorError::InvalidConfiguration { reason, .. }) if reason.contains("u64")
        );
        assert!(IdleSettings::from_millis(u64::MAX - 1, u64::MAX).validate().is_ok());
    }

    #[test]
    fn grace_period_is_difference() {
        assert_eq!(
            IdleSettings::default().grace_period(),
            Duration::from_secs(60)
        );
    }
}
