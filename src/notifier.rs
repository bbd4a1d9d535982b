// src/notifier.rs
//
// Delivery of over-limit alerts. Every alert is logged; when a webhook is
// configured it is also POSTed as JSON. Delivery is fire-and-forget: a
// failed POST is logged and counted, never surfaced to the analysis loop.

use crate::pipeline::{PipelineMetrics, SpeedAlert};
use crate::types::NotifierConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    analysis_id: &'a str,
    message: String,
    limit_kmh: f64,
    record: &'a crate::analysis::ViolationRecord,
}

struct WebhookTarget {
    http_client: reqwest::Client,
    url: String,
}

pub struct AlertNotifier {
    analysis_id: String,
    webhook: Option<WebhookTarget>,
    metrics: PipelineMetrics,
}

impl AlertNotifier {
    pub fn new(
        config: &NotifierConfig,
        analysis_id: impl Into<String>,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let webhook = match &config.webhook_url {
            Some(url) if !url.trim().is_empty() => {
                let http_client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .build()
                    .context("Failed to build HTTP client")?;
                Some(WebhookTarget {
                    http_client,
                    url: url.trim().to_string(),
                })
            }
            _ => None,
        };

        Ok(Self {
            analysis_id: analysis_id.into(),
            webhook,
            metrics,
        })
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook.is_some()
    }

    /// Returns true when the alert reached every configured channel.
    pub async fn notify(&self, alert: &SpeedAlert) -> bool {
        let message = alert.message();
        warn!("🚨 {}", message);

        let Some(webhook) = &self.webhook else {
            self.metrics.inc(&self.metrics.alerts_delivered);
            return true;
        };

        let payload = AlertPayload {
            analysis_id: &self.analysis_id,
            message,
            limit_kmh: alert.limit_kmh,
            record: &alert.record,
        };

        match webhook
            .http_client
            .post(&webhook.url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("Alert delivered to {}", webhook.url);
                self.metrics.inc(&self.metrics.alerts_delivered);
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                error!("Alert webhook returned {}: {}", status, body);
                self.metrics.inc(&self.metrics.alert_failures);
                false
            }
            Err(e) => {
                error!("Alert webhook request failed: {}", e);
                self.metrics.inc(&self.metrics.alert_failures);
                false
            }
        }
    }
}
