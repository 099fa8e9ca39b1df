//! Configuration types and defaults
//!
//! [`FieldCapConfig`] is the single source for every tunable the capture
//! screens use. Component configs are derived from it rather than built by
//! hand, so the recording ceiling and publish interval live in one place.

use fieldcap_api::{ApiClientConfig, DEFAULT_BASE_URL};
use fieldcap_core::{Coordinates, FieldCapError, FieldCapResult};
use fieldcap_location::{FollowPolicy, MapConfig, PublisherConfig, MAX_ZOOM, MIN_ZOOM};
use fieldcap_media::{RecorderConfig, StillCaptureConfig, VideoResolution};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Prefix for environment variables read by [`FieldCapConfig::from_env`]
pub const ENV_PREFIX: &str = "FIELDCAP_";

/// Largest image accepted by `attach_image` by default (5 MiB)
pub const DEFAULT_MAX_ATTACHED_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Global field capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCapConfig {
    /// Backend base URL including the `/api` prefix
    pub api_base_url: String,
    /// Bearer token for backend requests
    pub api_token: Option<String>,
    /// Longest recording, in seconds
    pub recording_ceiling_secs: u64,
    /// Countdown step, in milliseconds
    pub countdown_tick_ms: u64,
    /// Seconds between location cycles
    pub location_interval_secs: u64,
    /// Seconds to wait for a position fix
    pub position_timeout_secs: u64,
    /// Still width when the feed reports none
    pub still_fallback_width: u32,
    /// Still height when the feed reports none
    pub still_fallback_height: u32,
    /// Initial map zoom
    pub map_zoom: u8,
    /// Map auto-centering policy
    pub follow_policy: FollowPolicy,
    /// Largest image accepted from storage
    pub max_attached_image_bytes: usize,
    /// Container type requested from the recorder
    pub video_mime_type: String,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for FieldCapConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            recording_ceiling_secs: 28,
            countdown_tick_ms: 1000,
            location_interval_secs: 60,
            position_timeout_secs: 10,
            still_fallback_width: 320,
            still_fallback_height: 240,
            map_zoom: 15,
            follow_policy: FollowPolicy::default(),
            max_attached_image_bytes: DEFAULT_MAX_ATTACHED_IMAGE_BYTES,
            video_mime_type: "video/webm".to_string(),
            debug_logging: false,
        }
    }
}

impl FieldCapConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> FieldCapResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| FieldCapError::Configuration {
            field: "json".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read `FIELDCAP_*` variables, loading `.env` first when present
    pub fn from_env() -> FieldCapResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// Keys are the upper-cased field names with the `FIELDCAP_` prefix,
    /// e.g. `FIELDCAP_RECORDING_CEILING_SECS`.
    pub fn from_lookup<F>(lookup: F) -> FieldCapResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        if let Some(url) = env.string("API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(token) = env.string("API_TOKEN") {
            config.api_token = Some(token);
        }
        env.parse("RECORDING_CEILING_SECS", &mut config.recording_ceiling_secs)?;
        env.parse("COUNTDOWN_TICK_MS", &mut config.countdown_tick_ms)?;
        env.parse("LOCATION_INTERVAL_SECS", &mut config.location_interval_secs)?;
        env.parse("POSITION_TIMEOUT_SECS", &mut config.position_timeout_secs)?;
        env.parse("STILL_FALLBACK_WIDTH", &mut config.still_fallback_width)?;
        env.parse("STILL_FALLBACK_HEIGHT", &mut config.still_fallback_height)?;
        env.parse("MAP_ZOOM", &mut config.map_zoom)?;
        env.parse("MAX_ATTACHED_IMAGE_BYTES", &mut config.max_attached_image_bytes)?;
        env.parse("DEBUG_LOGGING", &mut config.debug_logging)?;
        if let Some(mime) = env.string("VIDEO_MIME_TYPE") {
            config.video_mime_type = mime;
        }
        if let Some(policy) = env.string("FOLLOW_POLICY") {
            config.follow_policy = parse_follow_policy(&policy)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> FieldCapResult<()> {
        let nonzero = [
            ("recording_ceiling_secs", self.recording_ceiling_secs),
            ("countdown_tick_ms", self.countdown_tick_ms),
            ("location_interval_secs", self.location_interval_secs),
            ("position_timeout_secs", self.position_timeout_secs),
            ("still_fallback_width", u64::from(self.still_fallback_width)),
            ("still_fallback_height", u64::from(self.still_fallback_height)),
            ("max_attached_image_bytes", self.max_attached_image_bytes as u64),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        let Some(ceiling_ms) = self.recording_ceiling_secs.checked_mul(1000) else {
            return Err(invalid(
                "recording_ceiling_secs",
                "too large to express in milliseconds",
            ));
        };
        if self.countdown_tick_ms > ceiling_ms {
            return Err(invalid(
                "countdown_tick_ms",
                "must not exceed the recording ceiling",
            ));
        }
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.map_zoom) {
            return Err(invalid(
                "map_zoom",
                format!("must be within {}..={}", MIN_ZOOM, MAX_ZOOM),
            ));
        }
        if !self.video_mime_type.starts_with("video/") {
            return Err(invalid("video_mime_type", "must be a video/* type"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(invalid("api_base_url", "must be an http(s) URL"));
        }
        Ok(())
    }

    /// Recorder settings
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            ceiling: Duration::from_secs(self.recording_ceiling_secs),
            tick: Duration::from_millis(self.countdown_tick_ms),
            mime_type: self.video_mime_type.clone(),
            ..RecorderConfig::default()
        }
    }

    /// Still capture settings
    pub fn still_config(&self) -> StillCaptureConfig {
        StillCaptureConfig {
            fallback_resolution: VideoResolution {
                width: self.still_fallback_width,
                height: self.still_fallback_height,
            },
        }
    }

    /// Location publisher settings
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            interval: Duration::from_secs(self.location_interval_secs),
            position_timeout: Duration::from_secs(self.position_timeout_secs),
        }
    }

    /// Map settings centered on `initial_center`
    pub fn map_config(&self, initial_center: Coordinates) -> MapConfig {
        MapConfig {
            zoom: self.map_zoom,
            follow_policy: self.follow_policy,
            initial_center,
        }
    }

    /// Backend client settings
    pub fn api_client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            base_url: self.api_base_url.clone(),
            bearer_token: self.api_token.clone(),
            ..ApiClientConfig::default()
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, name))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, slot: &mut T) -> FieldCapResult<()>
    where
        T::Err: std::fmt::Display,
    {
        if let Some(raw) = self.string(name) {
            *slot = raw.parse().map_err(|e: T::Err| FieldCapError::Configuration {
                field: format!("{}{}", ENV_PREFIX, name),
                reason: format!("{:?}: {}", raw, e),
            })?;
        }
        Ok(())
    }
}

fn parse_follow_policy(raw: &str) -> FieldCapResult<FollowPolicy> {
    match raw.to_ascii_lowercase().as_str() {
        "always" => Ok(FollowPolicy::Always),
        "until_user_pans" => Ok(FollowPolicy::UntilUserPans),
        "never" => Ok(FollowPolicy::Never),
        other => Err(invalid(
            "follow_policy",
            format!("unknown policy {:?}", other),
        )),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> FieldCapError {
    FieldCapError::Configuration {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = FieldCapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recorder_config().ceiling, Duration::from_secs(28));
        assert_eq!(config.publisher_config().interval, Duration::from_secs(60));
        assert_eq!(
            config.still_config().fallback_resolution,
            VideoResolution::QVGA
        );
    }

    #[test]
    fn test_json_keeps_missing_defaults() {
        let config =
            FieldCapConfig::from_json_str(r#"{"recording_ceiling_secs": 15, "follow_policy": "always"}"#)
                .unwrap();
        assert_eq!(config.recording_ceiling_secs, 15);
        assert_eq!(config.follow_policy, FollowPolicy::Always);
        assert_eq!(config.location_interval_secs, 60);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FIELDCAP_API_BASE_URL", "https://inspect.example.org/api"),
            ("FIELDCAP_API_TOKEN", "abc"),
            ("FIELDCAP_LOCATION_INTERVAL_SECS", "30"),
            ("FIELDCAP_FOLLOW_POLICY", "never"),
            ("FIELDCAP_DEBUG_LOGGING", "true"),
        ]
        .into_iter()
        .collect();

        let config =
            FieldCapConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_base_url, "https://inspect.example.org/api");
        assert_eq!(config.api_client_config().bearer_token.as_deref(), Some("abc"));
        assert_eq!(config.location_interval_secs, 30);
        assert_eq!(config.follow_policy, FollowPolicy::Never);
        assert!(config.debug_logging);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let error = FieldCapConfig::from_lookup(|key| {
            (key == "FIELDCAP_MAP_ZOOM").then(|| "close".to_string())
        })
        .unwrap_err();
        assert_eq!(error.error_code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_validation_rejects_zero_and_zoom() {
        let config = FieldCapConfig {
            recording_ceiling_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FieldCapError::Configuration { ref field, .. }) if field == "recording_ceiling_secs"
        ));

        let config = FieldCapConfig {
            map_zoom: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_ceiling_is_rejected() {
        let error =
            FieldCapConfig::from_json_str(r#"{"recording_ceiling_secs": 18446744073709551615}"#)
                .unwrap_err();
        assert!(matches!(
            error,
            FieldCapError::Configuration { ref field, .. } if field == "recording_ceiling_secs"
        ));

        let error = FieldCapConfig::from_lookup(|key| {
            (key == "FIELDCAP_RECORDING_CEILING_SECS").then(|| u64::MAX.to_string())
        })
        .unwrap_err();
        assert_eq!(error.error_code(), "INVALID_CONFIGURATION");
    }
}
