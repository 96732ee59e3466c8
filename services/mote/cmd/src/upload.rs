//! HTTP upload of basestation readings.
//!
//! Each record is POSTed on its own with the JSON text in the `msg` query
//! parameter, the form the sensor web application expects at
//! `/sensors/upload`.

use crate::basestation::ReadingRecord;
use anyhow::{bail, Context, Result};
use reqwest::{Client, ClientBuilder, Url};
use std::time::Duration;

/// Give up on a single upload after this long
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts readings to a sensor web application
#[derive(Debug, Clone)]
pub struct Uploader {
    client: Client,
    url: Url,
}

impl Uploader {
    /// Uploader for `url`, e.g. `http://127.0.0.1:8080/sensors/upload`
    pub fn new(url: &str) -> Result<Self> {
        Self::with_builder(url, Client::builder())
    }

    fn with_builder(url: &str, builder: ClientBuilder) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid upload url {:?}", url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("upload url must be http or https, got {}", url.scheme());
        }

        let client = builder
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST one record; non-2xx responses are errors
    pub async fn upload(&self, record: &ReadingRecord) -> Result<()> {
        let msg = serde_json::to_string(record).context("failed to encode reading")?;

        self.client
            .post(self.url.clone())
            .query(&[("msg", msg.as_str())])
            .send()
            .await
            .with_context(|| format!("upload to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("upload to {} rejected", self.url))?;

        Ok(())
    }
}
