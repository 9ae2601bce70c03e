use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::error::UserError;
use crate::run_id::RunId;

/// One model run as published by the web service.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelRunProperty {
    #[serde(rename = "model_run_id")]
    pub run_id: RunId,
    pub user_name: String,
    pub is_published: bool,
    pub is_public: bool,
    #[serde(default)]
    pub last_status_changed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelRunList {
    model_runs: Vec<ModelRunProperty>,
}

/// Client for the model-run web service (the authority on which runs exist).
pub struct ModelRunService {
    http: reqwest::blocking::Client,
    url: String,
}

impl ModelRunService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let timeout = Duration::from_secs_f64(config.timeout_secs);
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout);

        // TLS client certificate is optional; cert and key are separate PEM
        // files concatenated into one identity.
        if let (Some(cert), Some(key)) = (&config.certificate, &config.key) {
            let mut pem = std::fs::read(cert)
                .with_context(|| format!("Failed to read certificate: {}", cert.display()))?;
            pem.extend(
                std::fs::read(key)
                    .with_context(|| format!("Failed to read key: {}", key.display()))?,
            );
            let identity = reqwest::Identity::from_pem(&pem)
                .context("Failed to build TLS client identity")?;
            builder = builder.identity(identity);
        }

        Ok(Self {
            http: builder.build().context("Failed to build HTTP client")?,
            url: config.url.clone(),
        })
    }

    /// Fetch the canonical list of model runs.
    pub fn fetch_model_runs(&self) -> Result<Vec<ModelRunProperty>> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .map_err(|e| UserError::from_request(&e, &self.url))?;

        if !resp.status().is_success() {
            return Err(UserError::client(format!(
                "Request to {} failed with status {}",
                self.url,
                resp.status()
            ))
            .into());
        }

        let list: ModelRunList = resp.json().map_err(|e| {
            UserError::client(format!("Invalid model-run list from {}: {e}", self.url))
        })?;
        Ok(list.model_runs)
    }
}
