use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

pub const WEBHOOK_URL_ENV: &str = "NOTIFIER_WEBHOOK_URL";

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults plus environment overrides, for runs without a
    /// config file.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_webhook_override(std::env::var(WEBHOOK_URL_ENV).ok());
    }

    fn apply_webhook_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.notifier.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.frame_rate == 0 {
            bail!("video.frame_rate must be positive");
        }
        if self.calibration.target_width <= 1.0 || self.calibration.target_height <= 1.0 {
            bail!(
                "calibration target must be larger than 1x1 (got {}x{})",
                self.calibration.target_width,
                self.calibration.target_height
            );
        }
        if let Some(polygon) = &self.zone.polygon {
            if polygon.len() < 3 {
                bail!("zone.polygon needs at least 3 vertices, got {}", polygon.len());
            }
        }

        let s = &self.speed;
        for (name, value) in [
            ("speed.limit_kmh", s.limit_kmh),
            ("speed.noise_floor_kmh", s.noise_floor_kmh),
            ("speed.debounce_speed_delta_kmh", s.debounce_speed_delta_kmh),
            ("speed.debounce_interval_secs", s.debounce_interval_secs),
            ("speed.high_severity_kmh", s.high_severity_kmh),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number, got {}", name, value);
            }
        }

        if let Some(secs) = self.pipeline.history_eviction_secs {
            if secs.is_nan() || secs <= 0.0 {
                bail!("pipeline.history_eviction_secs must be positive, got {}", secs);
            }
        }
        if self.pipeline.max_pending_events == 0 {
            bail!("pipeline.max_pending_events must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "video:\n  frame_rate: 25\nspeed:\n  limit_kmh: 80\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.video.frame_rate, 25);
        assert_eq!(config.speed.limit_kmh, 80.0);
        assert_eq!(config.speed.noise_floor_kmh, 5.0);
        assert_eq!(config.calibration.target_height, 250.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config: Config =
            serde_yaml::from_str(include_str!("../config.yaml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration.source, Config::default().calibration.source);
        assert_eq!(config.speed.limit_kmh, 100.0);
        assert!(config.zone.polygon.is_none());
        assert!(config.notifier.webhook_url.is_none());
    }

    #[test]
    fn test_webhook_override_applies_to_defaults() {
        let mut config = Config::default();
        config.apply_webhook_override(None);
        assert!(config.notifier.webhook_url.is_none());
        config.apply_webhook_override(Some("  ".into()));
        assert!(config.notifier.webhook_url.is_none());
        config.apply_webhook_override(Some("http://alerts.local/hook".into()));
        assert_eq!(
            config.notifier.webhook_url.as_deref(),
            Some("http://alerts.local/hook")
        );
    }

    #[test]
    fn test_calibration_points_parse_as_pairs() {
        let yaml = "calibration:\n  source: [[0, 0], [10, 0], [10, 10], [0, 10]]\n  target_width: 5\n  target_height: 50\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.calibration.source[2], Point2::new(10.0, 10.0));
    }

    #[test]
    fn test_validate_rejects_zero_frame_rate() {
        let mut config = Config::default();
        config.video.frame_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_zone() {
        let mut config = Config::default();
        config.zone.polygon = Some(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut config = Config::default();
        config.speed.debounce_interval_secs = -1.0;
        assert!(config.validate().is_err());
    }
}
