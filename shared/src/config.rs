use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;
use crate::model::ImageQuality;
use crate::{DEFAULT_NEAR_RADIUS_M, DEFAULT_UPLOAD_RESULT_HOLD_MS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewModelConfig {
    /// How long a finished upload keeps showing its result.
    pub upload_result_hold_ms: u64,
    pub reference_point: Coordinate,
    pub near_radius_m: f64,
}

impl Default for ViewModelConfig {
    fn default() -> Self {
        Self {
            upload_result_hold_ms: DEFAULT_UPLOAD_RESULT_HOLD_MS,
            reference_point: Coordinate::SAN_FRANCISCO,
            near_radius_m: DEFAULT_NEAR_RADIUS_M,
        }
    }
}

impl ViewModelConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.near_radius_m.is_finite() || self.near_radius_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "near_radius_m must be a positive distance, got {}",
                self.near_radius_m
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn upload_result_hold(&self) -> Duration {
        Duration::from_millis(self.upload_result_hold_ms)
    }

    #[must_use]
    pub fn with_upload_result_hold(mut self, hold: Duration) -> Self {
        self.upload_result_hold_ms = u64::try_from(hold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_reference_point(mut self, reference_point: Coordinate) -> Self {
        self.reference_point = reference_point;
        self
    }

    #[must_use]
    pub fn with_near_radius_m(mut self, near_radius_m: f64) -> Self {
        self.near_radius_m = near_radius_m;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    #[must_use]
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    /// Uniform pick inside the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

/// Latencies and failure switches for the bundled reference capabilities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub low_quality_latency: LatencyRange,
    pub high_quality_latency: LatencyRange,
    pub upload_latency: LatencyRange,
    pub fail_low_quality_download: bool,
    pub fail_high_quality_download: bool,
    pub fail_upload: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            low_quality_latency: LatencyRange {
                min_ms: 200,
                max_ms: 1_000,
            },
            high_quality_latency: LatencyRange {
                min_ms: 500,
                max_ms: 2_000,
            },
            upload_latency: LatencyRange::fixed(1_000),
            fail_low_quality_download: false,
            fail_high_quality_download: false,
            fail_upload: false,
        }
    }
}

impl SimulationConfig {
    /// No artificial delays.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            low_quality_latency: LatencyRange::fixed(0),
            high_quality_latency: LatencyRange::fixed(0),
            upload_latency: LatencyRange::fixed(0),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        for (name, range) in [
            ("low_quality_latency", config.low_quality_latency),
            ("high_quality_latency", config.high_quality_latency),
            ("upload_latency", config.upload_latency),
        ] {
            if range.min_ms > range.max_ms {
                return Err(ConfigError::Invalid(format!(
                    "{name}: min_ms {} exceeds max_ms {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        Ok(config)
    }

    #[must_use]
    pub const fn download_latency(&self, quality: ImageQuality) -> LatencyRange {
        match quality {
            ImageQuality::Low => self.low_quality_latency,
            ImageQuality::High => self.high_quality_latency,
        }
    }

    #[must_use]
    pub const fn fails_download(&self, quality: ImageQuality) -> bool {
        match quality {
            ImageQuality::Low => self.fail_low_quality_download,
            ImageQuality::High => self.fail_high_quality_download,
        }
    }
}
