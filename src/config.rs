//! Provider configuration and duration parsing.

use std::time::Duration;

use serde::Deserialize;

use crate::client::ClientConfig;
use crate::error::ProviderError;

/// Environment variable consulted when `url` is not configured.
pub const URL_ENV: &str = "ARCANE_URL";

/// Environment variable consulted when `api_key` is not configured.
pub const API_KEY_ENV: &str = "ARCANE_API_KEY";

/// How long a deployment waits for the environment agent by default.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// The `provider "arcane" { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Arcane API, e.g. `http://arcane.local:8000`.
    pub url: Option<String>,
    /// API key sent as `X-API-Key`.
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ClientConfig, ProviderError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve, reading fallbacks through `lookup`.
    ///
    /// Empty strings count as unset, both in config and in the environment.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ClientConfig, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |configured: Option<String>, env: &str| {
            configured
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(env).filter(|v| !v.is_empty()))
        };

        let url = pick(self.url, URL_ENV).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "The provider requires an Arcane URL. Set it in the provider configuration or via the {} environment variable.",
                URL_ENV
            ))
        })?;
        let api_key = pick(self.api_key, API_KEY_ENV);

        Ok(ClientConfig::new(url).with_api_key(api_key))
    }
}

/// Parse a duration string such as `30s`, `2m`, `1h30m`, `1.5s` or `500ms`.
///
/// Accepted units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is
/// allowed; any other number needs a unit. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ProviderError> {
    let invalid = || ProviderError::Validation(format!("invalid duration \"{}\"", input));

    let s = input.strip_prefix('+').unwrap_or(input);
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() || s.starts_with('-') {
        return Err(invalid());
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        total += value * nanos_per_unit;
        rest = tail;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

/// Render a duration the way [`parse_duration`] reads it back (`2m0s` style).
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    if secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            n if n % 1_000_000 == 0 => format!("{}ms", n / 1_000_000),
            n if n % 1_000 == 0 => format!("{}us", n / 1_000),
            n => format!("{}ns", n),
        };
    }

    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let seconds = if nanos == 0 {
        format!("{}s", s)
    } else {
        let frac = format!("{:09}", nanos);
        format!("{}.{}s", s, frac.trim_end_matches('0'))
    };
    match (h, m) {
        (0, 0) => seconds,
        (0, m) => format!("{}m{}", m, seconds),
        (h, m) => format!("{}h{}m{}", h, m, seconds),
    }
}
