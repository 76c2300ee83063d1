use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

use crate::auth::ConferenceAuth;
use crate::clients::http_client;
use crate::error::ConferenceApiError;

/// Meeting creation payload sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeetingRequest {
    pub subject: String,
    pub start_time: String,
    pub end_time: String,
    pub attendees: Vec<String>,
}

/// Provisioned meeting as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedMeeting {
    pub meeting_id: String,
    pub join_url: String,
}

#[derive(Deserialize)]
struct CreateMeetingResponse {
    meeting_id: String,
    join_url: Option<String>,
}

/// Conference meeting provisioning, made swappable for tests.
#[async_trait]
pub trait ConferenceApi: Send + Sync {
    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest,
    ) -> Result<CreatedMeeting, ConferenceApiError>;

    fn is_configured(&self) -> bool;
}

/// HTTP client for the conference provider API.
///
/// The provider is optional: with credentials missing every call reports
/// `NotConfigured` and callers fall back to generated links.
pub struct ConferenceClient {
    client: Client,
    endpoint: Option<String>,
    app_id: String,
    secret_id: String,
    secret_key: String,
}

impl ConferenceClient {
    /// Create a client from environment variables.
    pub fn from_env() -> Self {
        dotenv().ok();

        Self::new(
            env::var("CONFERENCE_API_ENDPOINT").ok(),
            env::var("CONFERENCE_APP_ID").unwrap_or_default(),
            env::var("CONFERENCE_SECRET_ID").unwrap_or_default(),
            env::var("CONFERENCE_SECRET_KEY").unwrap_or_default(),
        )
    }

    pub fn new(
        endpoint: Option<String>,
        app_id: String,
        secret_id: String,
        secret_key: String,
    ) -> Self {
        Self {
            client: http_client(),
            endpoint,
            app_id,
            secret_id,
            secret_key,
        }
    }

    fn generate_signature(
        &self,
        method: &str,
        uri: &str,
        timestamp: i64,
        nonce: &str,
        body: &str,
    ) -> String {
        ConferenceAuth::generate_signature(
            &self.secret_id,
            &self.secret_key,
            method,
            uri,
            timestamp,
            nonce,
            body,
        )
    }
}

#[async_trait]
impl ConferenceApi for ConferenceClient {
    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest,
    ) -> Result<CreatedMeeting, ConferenceApiError> {
        if !self.is_configured() {
            return Err(ConferenceApiError::NotConfigured);
        }
        let Some(endpoint) = &self.endpoint else {
            return Err(ConferenceApiError::NotConfigured);
        };

        let method = "POST";
        let uri = "/v1/meetings";
        let url = format!("{}{}", endpoint, uri);
        // Signed over the exact bytes that go on the wire
        let request_body = serde_json::to_string(request)?;

        let timestamp = ConferenceAuth::get_timestamp();
        let nonce = ConferenceAuth::generate_nonce();
        let signature = self.generate_signature(method, uri, timestamp, &nonce, &request_body);

        info!("Requesting meeting from conference provider");
        debug!("API URL: {}", url);

        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Conf-Key", &self.secret_id)
            .header("X-Conf-Timestamp", timestamp.to_string())
            .header("X-Conf-Nonce", &nonce)
            .header("X-Conf-Signature", signature)
            .header("AppId", &self.app_id)
            .body(request_body)
            .send()
            .await?;

        info!("Response received with status: {}", res.status());
        if !res.status().is_success() {
            return Err(ConferenceApiError::Unexpected {
                status: res.status().as_u16(),
            });
        }

        let response = res.json::<CreateMeetingResponse>().await?;
        let join_url = response.join_url.ok_or(ConferenceApiError::MissingJoinUrl)?;
        Ok(CreatedMeeting {
            meeting_id: response.meeting_id,
            join_url,
        })
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some() && !self.secret_id.is_empty() && !self.secret_key.is_empty()
    }
}
