// SPDX-License-Identifier: MIT OR Apache-2.0
//! Liveness check for the remote service.

use crate::RemoteError;
use crate::client::default_headers;
use bas_config::RemoteSettings;
use serde::Serialize;
use tracing::warn;

/// Result of [`check_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Whether the service answered successfully.
    pub healthy: bool,
    /// `ok`, `disabled`, `missing api key or base url`, `timeout`,
    /// `http <status>` or `unreachable`.
    pub reason: String,
}

impl HealthReport {
    fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: reason.into(),
        }
    }
}

/// Call `GET /api/v2/agents` using the health-check timeout for both the
/// connect and the overall request.
pub async fn check_health(settings: &RemoteSettings) -> HealthReport {
    if !settings.enabled {
        return HealthReport::unhealthy("disabled");
    }
    if !settings.is_configured() {
        return HealthReport::unhealthy("missing api key or base url");
    }

    let client = match default_headers(settings).and_then(|headers| {
        reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .connect_timeout(settings.healthcheck_timeout())
            .timeout(settings.healthcheck_timeout())
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }) {
        Ok(c) => c,
        Err(e) => {
            warn!(target: "bas.remote", error = %e, "health check client could not be built");
            return HealthReport::unhealthy("unreachable");
        }
    };

    let url = format!("{}/api/v2/agents", settings.api_base());
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => HealthReport {
            healthy: true,
            reason: "ok".into(),
        },
        Ok(resp) => {
            warn!(target: "bas.remote", status = %resp.status(), "health check failed");
            HealthReport::unhealthy(format!("http {}", resp.status().as_u16()))
        }
        Err(e) if e.is_timeout() => {
            warn!(target: "bas.remote", "health check timed out");
            HealthReport::unhealthy("timeout")
        }
        Err(e) => {
            warn!(target: "bas.remote", error = %e, "health check error");
            HealthReport::unhealthy("unreachable")
        }
    }
}

/// Fail with [`RemoteError::Unavailable`] unless [`check_health`] reports healthy.
pub async fn ensure_available(settings: &RemoteSettings) -> Result<(), RemoteError> {
    let report = check_health(settings).await;
    if report.healthy {
        Ok(())
    } else {
        Err(RemoteError::Unavailable(format!(
            "remote service is not available: {}",
            report.reason
        )))
    }
}
