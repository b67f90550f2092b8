//! HTTP clients for the two saga hops

use super::{FeatureSource, HopFailure, InferenceClient};
use crate::models::{FeatureRecord, PredictPayload, PredictResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

/// Acquisition endpoint, relative to its base URL
pub const ACQUIRE_PATH: &str = "data";

/// Inference endpoint, relative to its base URL
pub const PREDICT_PATH: &str = "predict";

fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid base URL {}", base_url))?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).context("Invalid path")
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, HopFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| HopFailure::Transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(HopFailure::Status { status, body });
    }

    response
        .json()
        .await
        .map_err(|e| HopFailure::Decode(e.to_string()))
}

/// `POST {acquire}/data`
#[derive(Debug, Clone)]
pub struct HttpFeatureSource {
    client: Client,
    url: Url,
}

impl HttpFeatureSource {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            url: endpoint(base_url, ACQUIRE_PATH)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureSource {
    async fn acquire(&self) -> Result<FeatureRecord, HopFailure> {
        send_json(self.client.post(self.url.clone())).await
    }
}

/// `POST {predict}/predict`
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    url: Url,
}

impl HttpInferenceClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            url: endpoint(base_url, PREDICT_PATH)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn predict(&self, payload: &PredictPayload) -> Result<PredictResponse, HopFailure> {
        send_json(self.client.post(self.url.clone()).json(payload)).await
    }
}
