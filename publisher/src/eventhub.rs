//! Event Hubs sink over the HTTPS batch-send endpoint.
//!
//! Each batch becomes one `POST {scheme}://{host}/{hub}/messages` carrying a
//! JSON array of `{"Body": ...}` objects and a freshly signed shared access
//! signature. The service either accepts the whole batch (2xx) or rejects it.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::PublisherConfig;
use crate::errors::{ConfigurationError, TransportError};
use crate::sink::{BatchSink, EventBatch};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2014-01";
const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";
const TOKEN_TTL_SECS: i64 = 3600;

/// RFC 3986 unreserved characters pass through; everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
}

pub struct EventHubSink {
    /// `None` once closed.
    client: Option<Client>,
    messages_url: String,
    resource_uri: String,
    key_name: String,
    signer: HmacSha256,
    max_batch_bytes: usize,
}

impl EventHubSink {
    /// Build the HTTP client and signing key for the configured hub.
    pub fn new(config: &PublisherConfig) -> Result<Self, ConfigurationError> {
        let connection = config.connection()?;

        let signer = HmacSha256::new_from_slice(connection.key.as_bytes()).map_err(|e| {
            ConfigurationError::InvalidConnectionString(format!("unusable SharedAccessKey: {}", e))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConfigurationError::Client(e.to_string()))?;

        let resource_uri = format!(
            "{}://{}/{}",
            connection.scheme(),
            connection.host,
            config.eventhub_name
        );
        let messages_url = format!("{}/messages?api-version={}", resource_uri, API_VERSION);

        info!(
            url = %messages_url,
            key_name = %connection.key_name,
            "Event Hubs sink ready"
        );

        Ok(Self {
            client: Some(client),
            messages_url,
            resource_uri,
            key_name: connection.key_name,
            signer,
            max_batch_bytes: config.max_batch_bytes,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    /// `SharedAccessSignature` header value valid until `expiry` (unix seconds).
    fn sas_token(&self, expiry: i64) -> String {
        let encoded_uri = utf8_percent_encode(&self.resource_uri, COMPONENT).to_string();
        let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

        let mut mac = self.signer.clone();
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            encoded_uri,
            utf8_percent_encode(&signature, COMPONENT),
            expiry,
            utf8_percent_encode(&self.key_name, COMPONENT)
        )
    }

    fn encode(batch: &EventBatch) -> Result<Vec<u8>, TransportError> {
        let wire: Vec<WireEvent<'_>> = batch
            .events()
            .iter()
            .map(|body| WireEvent { body: body.as_str() })
            .collect();
        Ok(serde_json::to_vec(&wire)?)
    }
}

#[async_trait]
impl BatchSink for EventHubSink {
    fn name(&self) -> &'static str {
        "eventhub"
    }

    async fn send_batch(&self, batch: &EventBatch) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::Closed)?;

        let body = Self::encode(batch)?;
        if body.len() > self.max_batch_bytes {
            return Err(TransportError::BatchTooLarge {
                size: body.len(),
                limit: self.max_batch_bytes,
            });
        }

        debug!(
            batch_id = %batch.batch_id,
            events = batch.len(),
            bytes = body.len(),
            "Posting batch"
        );

        let start = Instant::now();
        let response = client
            .post(&self.messages_url)
            .header(CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .header(AUTHORIZATION, self.sas_token(Utc::now().timestamp() + TOKEN_TTL_SECS))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(
                batch_id = %batch.batch_id,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Batch accepted"
            );
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(
            batch_id = %batch.batch_id,
            status = status.as_u16(),
            message = %message,
            "Batch rejected"
        );
        Err(TransportError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            info!(url = %self.messages_url, "Event Hubs sink closed");
        }
    }
}
