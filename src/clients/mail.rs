use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

use crate::clients::http_client;
use crate::error::MailApiError;

/// One accepted (or simulated) mail handoff.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub id: Option<String>,
    pub simulated: bool,
}

/// Outbound mail, made swappable for tests.
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn send_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SendReceipt, MailApiError>;

    fn is_configured(&self) -> bool;

    fn sender_address(&self) -> &str;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    id: String,
}

/// HTTP client for the mail delivery API.
///
/// Without an API key the client runs in simulation mode: messages are
/// written to the log and reported as sent, so the rest of the pipeline
/// keeps working in development.
pub struct MailClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from_address: String,
}

impl MailClient {
    /// Create a client from environment variables.
    pub fn from_env() -> Self {
        dotenv().ok();

        Self::new(
            env::var("MAIL_API_ENDPOINT").unwrap_or_else(|_| "https://api.resend.com".to_string()),
            env::var("MAIL_API_KEY").ok(),
            env::var("MAIL_FROM_ADDRESS").unwrap_or_else(|_| "onboarding@resend.dev".to_string()),
        )
    }

    pub fn new(endpoint: String, api_key: Option<String>, from_address: String) -> Self {
        if api_key.is_none() {
            info!("MAIL_API_KEY not set - mail client running in simulation mode");
        }
        Self {
            client: http_client(),
            endpoint,
            api_key,
            from_address,
        }
    }
}

#[async_trait]
impl MailApi for MailClient {
    async fn send_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SendReceipt, MailApiError> {
        let Some(api_key) = &self.api_key else {
            info!("Simulated mail to {}: {}", to, subject);
            debug!("Simulated mail body:\n{}", body);
            return Ok(SendReceipt {
                id: None,
                simulated: true,
            });
        };

        let url = format!("{}/emails", self.endpoint);
        let payload = SendMessageRequest {
            from: &self.from_address,
            to: vec![to],
            subject,
            text: body,
        };

        debug!("Mail API request: {}", url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let detail = res.text().await.unwrap_or_default();
            return Err(MailApiError::Rejected { status, detail });
        }

        let accepted = res.json::<SendMessageResponse>().await?;
        info!("Mail accepted for {} with id {}", to, accepted.id);
        Ok(SendReceipt {
            id: Some(accepted.id),
            simulated: false,
        })
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn sender_address(&self) -> &str {
        &self.from_address
    }
}
