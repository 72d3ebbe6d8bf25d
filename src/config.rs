//! Session options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::WebRtcError;

const MAX_DURATION_MICROS: u64 = i32::MAX as u64;

/// Options of a WHIP/WHEP session.
///
/// ```
/// use std::time::Duration;
/// use whip_whep::WebRtcConfig;
///
/// let config = WebRtcConfig::new()
///     .set_bearer_token("secret")
///     .set_connection_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.bearer_token(), Some("secret"));
/// assert_eq!(config.rw_timeout(), Duration::from_secs(1));
/// ```
///
/// Options can also be set by name, as the host framework passes them.
///
/// ```
/// # use std::time::Duration;
/// # use whip_whep::WebRtcConfig;
/// let mut config = WebRtcConfig::new();
/// config.set_option("connection_timeout", "2.5")?;
/// config.set_option("rw_timeout", "500ms")?;
///
/// assert_eq!(config.connection_timeout(), Duration::from_millis(2500));
/// assert_eq!(config.rw_timeout(), Duration::from_millis(500));
/// # Ok::<(), whip_whep::WebRtcError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    bearer_token: Option<String>,
    connection_timeout: Duration,
    rw_timeout: Duration,
    max_delay: Option<Duration>,
}

impl WebRtcConfig {
    /// Names accepted by [`WebRtcConfig::set_option()`].
    pub const OPTIONS: &'static [&'static str] =
        &["bearer_token", "connection_timeout", "rw_timeout"];

    /// Creates a new default config.
    pub fn new() -> Self {
        WebRtcConfig::default()
    }

    /// Bearer token sent in the `Authorization` header, if set.
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Set a bearer token for authentication and authorization.
    pub fn set_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Timeout for establishing the connection.
    ///
    /// Defaults to 10 seconds.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Set the timeout for establishing the connection.
    pub fn set_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Timeout for receiving/writing data on a track.
    ///
    /// Defaults to 1 second.
    pub fn rw_timeout(&self) -> Duration {
        self.rw_timeout
    }

    /// Set the timeout for receiving/writing data.
    pub fn set_rw_timeout(mut self, timeout: Duration) -> Self {
        self.rw_timeout = timeout;
        self
    }

    /// Maximum demuxing delay passed on to egress sub-pipelines.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Set the maximum demuxing delay.
    pub fn set_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set an option by name.
    ///
    /// Durations are given as integer microseconds, as seconds with a fraction,
    /// with a `s`, `ms` or `us` suffix, or as `[HH:]MM:SS[.frac]`. They must be within
    /// 1µs and `i32::MAX` µs.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), WebRtcError> {
        match name {
            "bearer_token" => {
                self.bearer_token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "connection_timeout" => self.connection_timeout = parse_option_duration(name, value)?,
            "rw_timeout" => self.rw_timeout = parse_option_duration(name, value)?,
            _ => return Err(WebRtcError::Config(format!("unknown option: {}", name))),
        }
        Ok(())
    }
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            connection_timeout: Duration::from_secs(10),
            rw_timeout: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

fn parse_option_duration(name: &str, value: &str) -> Result<Duration, WebRtcError> {
    let micros = parse_micros(value.trim())
        .ok_or_else(|| WebRtcError::Config(format!("invalid duration for {}: {}", name, value)))?;

    if micros < 1 || micros > MAX_DURATION_MICROS {
        return Err(WebRtcError::Config(format!(
            "{} out of range: {}",
            name, value
        )));
    }

    Ok(Duration::from_micros(micros))
}

fn parse_micros(v: &str) -> Option<u64> {
    if v.is_empty() || v.starts_with('-') {
        return None;
    }

    if v.contains(':') {
        return parse_clock(v);
    }

    if let Some(n) = v.strip_suffix("us") {
        return n.parse().ok();
    }
    if let Some(n) = v.strip_suffix("ms") {
        return scale(n, 1_000);
    }
    if let Some(n) = v.strip_suffix('s') {
        return scale(n, 1_000_000);
    }

    // Plain integers are microseconds, anything with a fraction is seconds.
    if v.contains('.') {
        scale(v, 1_000_000)
    } else {
        v.parse().ok()
    }
}

/// `[HH:]MM:SS[.frac]`
fn parse_clock(v: &str) -> Option<u64> {
    let parts: Vec<&str> = v.split(':').collect();

    let (h, m, s) = match parts[..] {
        [m, s] => ("0", m, s),
        [h, m, s] => (h, m, s),
        _ => return None,
    };

    let h: u64 = h.parse().ok()?;
    let m: u64 = m.parse().ok()?;
    if m >= 60 {
        return None;
    }
    let s = scale(s, 1_000_000)?;
    if s >= 60_000_000 {
        return None;
    }

    h.checked_mul(3600)?
        .checked_add(m * 60)?
        .checked_mul(1_000_000)?
        .checked_add(s)
}

fn scale(n: &str, unit: u64) -> Option<u64> {
    let f: f64 = n.trim().parse().ok()?;
    if !f.is_finite() || f < 0.0 {
        return None;
    }
    Some((f * unit as f64).round() as u64)
}
