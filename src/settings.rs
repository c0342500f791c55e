use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::proctor::ProctorConfig;

pub const DEFAULT_SETTINGS_FILE: &str = "proctor.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingSettings {
    pub capture_period_ms: u64,
    pub first_capture_delay_ms: u64,
    pub inactivity_check_ms: u64,
    pub inactivity_threshold_ms: u64,
    pub timer_tick_ms: u64,
    pub autosave_period_ms: u64,
    pub auto_submit_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            capture_period_ms: 15_000,
            first_capture_delay_ms: 1_000,
            inactivity_check_ms: 1_000,
            inactivity_threshold_ms: 10_000,
            timer_tick_ms: 1_000,
            autosave_period_ms: 30_000,
            auto_submit_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProctorSettings {
    pub base_url: String,
    pub exam_id: Option<String>,
    pub csrf_token: String,
    pub exam_duration_minutes: u32,
    pub question_count: u32,
    pub has_exam_form: bool,
    /// Still image standing in for the webcam. Unset means access is denied.
    pub camera_image: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub debug: bool,
    pub timing: TimingSettings,
}

impl Default for ProctorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            exam_id: None,
            csrf_token: String::new(),
            exam_duration_minutes: 0,
            question_count: 0,
            has_exam_form: true,
            camera_image: None,
            jpeg_quality: 70,
            debug: false,
            timing: TimingSettings::default(),
        }
    }
}

impl ProctorSettings {
    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Loads from `PROCTOR_CONFIG` (or `proctor.json`) and applies the
    /// `PROCTOR_*` environment overrides.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("PROCTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
        let mut settings = Self::load(&path)?;
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("PROCTOR_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(exam_id) = var("PROCTOR_EXAM_ID") {
            self.exam_id = Some(exam_id);
        }
        if let Some(token) = var("PROCTOR_CSRF_TOKEN") {
            self.csrf_token = token;
        }
        if let Some(value) = var("PROCTOR_DEBUG") {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpeg_quality must be between 1 and 100, got {}", self.jpeg_quality);
        }
        let timing = &self.timing;
        for (name, value) in [
            ("capture_period_ms", timing.capture_period_ms),
            ("inactivity_check_ms", timing.inactivity_check_ms),
            ("timer_tick_ms", timing.timer_tick_ms),
            ("autosave_period_ms", timing.autosave_period_ms),
        ] {
            if value == 0 {
                bail!("timing.{name} must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn proctor_config(&self) -> ProctorConfig {
        ProctorConfig {
            inactivity_check: Duration::from_millis(self.timing.inactivity_check_ms),
            inactivity_threshold: Duration::from_millis(self.timing.inactivity_threshold_ms),
            first_capture_delay: Duration::from_millis(self.timing.first_capture_delay_ms),
            capture_period: Duration::from_millis(self.timing.capture_period_ms),
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn exam_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.exam_duration_minutes) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProctorSettings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, ProctorSettings::default());
        assert_eq!(settings.proctor_config(), ProctorConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.json");
        fs::write(
            &path,
            r#"{ "exam_id": "EX42", "exam_duration_minutes": 45, "timing": { "capture_period_ms": 5000 } }"#,
        )
        .unwrap();

        let settings = ProctorSettings::load(&path).unwrap();
        assert_eq!(settings.exam_id.as_deref(), Some("EX42"));
        assert_eq!(settings.exam_duration(), Duration::from_secs(45 * 60));
        assert_eq!(settings.timing.capture_period_ms, 5000);
        assert_eq!(settings.timing.inactivity_threshold_ms, 10_000);
        assert!(settings.has_exam_form);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ProctorSettings::load(&path).is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let env = HashMap::from([
            ("PROCTOR_BASE_URL", "https://exams.example.com"),
            ("PROCTOR_EXAM_ID", "17"),
            ("PROCTOR_DEBUG", "TRUE"),
        ]);
        let mut settings = ProctorSettings::default();
        settings.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.base_url, "https://exams.example.com");
        assert_eq!(settings.exam_id.as_deref(), Some("17"));
        assert!(settings.debug);
        assert_eq!(settings.csrf_token, "");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut settings = ProctorSettings::default();
        settings.jpeg_quality = 0;
        assert!(settings.validate().is_err());

        let mut settings = ProctorSettings::default();
        settings.timing.capture_period_ms = 0;
        assert!(settings.validate().is_err());

        assert!(ProctorSettings::default().validate().is_ok());
    }
}
