//! Best-effort geo-IP timezone lookup.
//!
//! Used only to default a new user's settings timezone from their client IP.
//! Every failure path returns `None` after a log line; a geo-IP outage must
//! never surface to the caller.

use std::time::Duration;

use serde::Deserialize;

const LOOKUP_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Deserialize)]
struct GeoIpResponse {
    timezone: Option<String>,
}

/// Looks up the IANA timezone for an IP address, e.g. `"America/Chicago"`.
///
/// Private, loopback, and malformed addresses resolve to nothing upstream;
/// those and any network or parse failure all come back as `None`.
pub async fn lookup_timezone(base_url: &str, ip: &str) -> Option<String> {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "geoip: client construction failed");
            return None;
        }
    };

    let url = format!("{}/{ip}/json", base_url.trim_end_matches('/'));
    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, ip, "geoip: lookup request failed");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), ip, "geoip: lookup returned non-2xx");
        return None;
    }

    match response.json::<GeoIpResponse>().await {
        Ok(parsed) => parsed.timezone.filter(|tz| !tz.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, ip, "geoip: response parse failed");
            None
        }
    }
}
