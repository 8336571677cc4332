// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://k8n.cn";
pub const DEFAULT_NOTIFY_URL: &str = "http://www.pushplus.plus/send";
pub const DEFAULT_LAT: &str = "34.114873";
pub const DEFAULT_LNG: &str = "108.942932";
pub const DEFAULT_ACC: &str = "10";
pub const DEFAULT_REQUEST_TIMEOUT: f64 = 10.0;
pub const DEFAULT_NOTIFY_TIMEOUT: f64 = 5.0;
pub const DEFAULT_VERIFY_DELAY: f64 = 1.0;

/// Text left in the template configuration where a value must be filled in.
const PLACEHOLDER: &str = "这里填写";

/// Coordinates submitted with every check-in, kept verbatim as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Latitude, in decimal degrees.
    pub lat: String,
    /// Longitude, in decimal degrees.
    pub lng: String,
    /// Accuracy radius, in m.
    pub acc: String,
}

/// Validated configuration of a run.
#[derive(Debug, Clone)]
pub struct Config {
    /// The class identifier, as found in `/student/course/<id>/punchs`.
    pub class_id: String,
    /// The full session cookie string.
    pub cookie: String,
    /// The position reported to the site.
    pub location: Location,
    /// PushPlus token; no notification is sent without it.
    pub pushplus_token: Option<String>,
    /// Scheme and host of the check-in site, without trailing slash.
    pub base_url: String,
    /// Endpoint of the push service.
    pub notify_url: String,
    /// Timeout of each request towards the check-in site.
    pub request_timeout: Duration,
    /// Timeout of the notification request.
    pub notify_timeout: Duration,
    /// Pause between a submission and its verification.
    pub verify_delay: Duration,
    /// Also notify the tasks that could not be verified as signed.
    pub notify_failures: bool,
}

impl Config {
    pub fn listing_url(&self) -> String {
        format!("{}/student/course/{}/punchs", self.base_url, self.class_id)
    }

    pub fn referer_url(&self) -> String {
        format!("{}/student/course/{}", self.base_url, self.class_id)
    }

    pub fn submit_url(&self, task_id: &crate::task::TaskId) -> String {
        format!(
            "{}/student/punchs/course/{}/{}",
            self.base_url, self.class_id, task_id
        )
    }
}

/// A scalar that may be written either as a string or as a number in TOML.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Scalar> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.map(|x| match x {
        Scalar::Text(s) => s,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    }))
}

/// Raw, possibly incomplete settings collected from one source.
///
/// Sources are layered with [`Settings::merge`] and then turned into a
/// [`Config`] with [`Settings::validate`].
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default, deserialize_with = "string_or_number")]
    pub class_id: Option<String>,
    pub cookie: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub lat: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub lng: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub acc: Option<String>,
    pub pushplus_token: Option<String>,
    pub base_url: Option<String>,
    pub notify_url: Option<String>,
    /// In s.
    pub request_timeout: Option<f64>,
    /// In s.
    pub notify_timeout: Option<f64>,
    /// In s.
    pub verify_delay: Option<f64>,
    pub notify_failures: Option<bool>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file_error = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        toml::from_str(&content).map_err(|e| file_error(e.to_string()))
    }

    /// Layer `other` on top of `self`: the values set in `other` win.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            class_id: other.class_id.or(self.class_id),
            cookie: other.cookie.or(self.cookie),
            lat: other.lat.or(self.lat),
            lng: other.lng.or(self.lng),
            acc: other.acc.or(self.acc),
            pushplus_token: other.pushplus_token.or(self.pushplus_token),
            base_url: other.base_url.or(self.base_url),
            notify_url: other.notify_url.or(self.notify_url),
            request_timeout: other.request_timeout.or(self.request_timeout),
            notify_timeout: other.notify_timeout.or(self.notify_timeout),
            verify_delay: other.verify_delay.or(self.verify_delay),
            notify_failures: other.notify_failures.or(self.notify_failures),
        }
    }

    /// Check that all the required settings are present and well-formed.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let class_id = required("class_id", self.class_id)?;
        if !class_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid {
                field: "class_id",
                reason: format!("'{}' is not an alphanumeric identifier", class_id),
            });
        }
        let cookie = required("cookie", self.cookie)?;

        let location = Location {
            lat: coordinate("lat", self.lat, DEFAULT_LAT, -90.0..=90.0)?,
            lng: coordinate("lng", self.lng, DEFAULT_LNG, -180.0..=180.0)?,
            acc: coordinate("acc", self.acc, DEFAULT_ACC, 0.0..=f64::MAX)?,
        };

        let pushplus_token = self
            .pushplus_token
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty());

        Ok(Config {
            class_id,
            cookie,
            location,
            pushplus_token,
            base_url: url("base_url", self.base_url, DEFAULT_BASE_URL)?,
            notify_url: url("notify_url", self.notify_url, DEFAULT_NOTIFY_URL)?,
            request_timeout: seconds(
                "request_timeout",
                self.request_timeout,
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            notify_timeout: seconds(
                "notify_timeout",
                self.notify_timeout,
                DEFAULT_NOTIFY_TIMEOUT,
            )?,
            verify_delay: seconds("verify_delay", self.verify_delay, DEFAULT_VERIFY_DELAY)?,
            notify_failures: self.notify_failures.unwrap_or(false),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|x| x.trim().to_string()) {
        Some(x) if !x.is_empty() && !x.contains(PLACEHOLDER) => Ok(x),
        _ => Err(ConfigError::Missing(field)),
    }
}

fn coordinate(
    field: &'static str,
    value: Option<String>,
    default: &str,
    range: std::ops::RangeInclusive<f64>,
) -> Result<String, ConfigError> {
    let value = value
        .map(|x| x.trim().to_string())
        .unwrap_or_else(|| default.to_string());
    match value.parse::<f64>() {
        Ok(x) if x.is_finite() && range.contains(&x) => Ok(value),
        Ok(_) => Err(ConfigError::Invalid {
            field,
            reason: format!("{} out of range", value),
        }),
        Err(_) => Err(ConfigError::Invalid {
            field,
            reason: format!("'{}' is not a decimal number", value),
        }),
    }
}

fn url(field: &'static str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let value = value.trim().trim_end_matches('/').to_string();
    match reqwest::Url::parse(&value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(value),
        Ok(parsed) => Err(ConfigError::Invalid {
            field,
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => Err(ConfigError::Invalid {
            field,
            reason: format!("'{}': {}", value, e),
        }),
    }
}

fn seconds(field: &'static str, value: Option<f64>, default: f64) -> Result<Duration, ConfigError> {
    let value = value.unwrap_or(default);
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("{} is not a valid duration in s", value),
    })
}
