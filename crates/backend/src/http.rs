use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use visitbook_core::models::{
    booking::{BookingRecord, CancelOutcome, SubmissionRequest, SubmitOutcome},
    slot::SlotsPayload,
};

use crate::{config::BackendConfig, op, BookingBackend};

/// Backend reached over HTTP.
///
/// Every operation is a `GET` on the base URL with the operation tag in the
/// `type` query parameter, the shape a spreadsheet web-app deployment
/// exposes.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, request_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| eyre!("BACKEND_URL environment variable not set"))?;

        Self::new(url, config.request_timeout)
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<String> {
        let tag = params.first().map(|(_, value)| *value).unwrap_or_default();
        debug!("Calling backend operation {}", tag);

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .wrap_err_with(|| format!("Request for {} failed", tag))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(eyre!("{} returned {}: {}", tag, status, error_text));
        }

        response
            .text()
            .await
            .wrap_err_with(|| format!("Failed to read {} response", tag))
    }
}

fn parse_body<T: DeserializeOwned>(tag: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).wrap_err_with(|| format!("Malformed {} response", tag))
}

/// `getBooking` answers with an empty body, `null` or `{}` when the address
/// holds no booking.
fn parse_booking_body(body: &str) -> Result<BookingRecord> {
    if body.trim().is_empty() {
        return Ok(BookingRecord::default());
    }

    let record: Option<BookingRecord> = parse_body(op::GET_BOOKING, body)?;
    Ok(record.unwrap_or_default())
}

#[async_trait]
impl BookingBackend for HttpBackend {
    async fn get_slots(&self) -> Result<SlotsPayload> {
        let body = self.call(&[("type", op::GET_SLOTS)]).await?;
        parse_body(op::GET_SLOTS, &body)
    }

    async fn get_booking(&self, address: &str) -> Result<BookingRecord> {
        let body = self
            .call(&[("type", op::GET_BOOKING), ("email", address)])
            .await?;
        parse_booking_body(&body)
    }

    async fn submit_booking(&self, request: &SubmissionRequest) -> Result<SubmitOutcome> {
        let visit1 = request.visit1.to_string();
        let visit2 = request.visit2.to_string();

        let body = self
            .call(&[
                ("type", op::SUBMIT_BOOKING),
                ("email", request.address.as_str()),
                ("name", request.name.as_str()),
                ("visit1", visit1.as_str()),
                ("visit2", visit2.as_str()),
            ])
            .await?;

        parse_body(op::SUBMIT_BOOKING, &body)
    }

    async fn cancel_booking(&self, address: &str) -> Result<CancelOutcome> {
        let body = self
            .call(&[("type", op::CANCEL_BOOKING), ("email", address)])
            .await?;
        parse_body(op::CANCEL_BOOKING, &body)
    }
}
