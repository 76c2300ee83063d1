use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::{Client, StatusCode};
use std::env;
use tracing::{debug, info};

use crate::clients::http_client;
use crate::error::StoreError;
use crate::models::lesson::{Lesson, Party};

/// Read access to the lesson store, made swappable for tests.
#[async_trait]
pub trait LessonDirectory: Send + Sync {
    /// All lessons currently in confirmed state.
    async fn list_confirmed_lessons(&self) -> Result<Vec<Lesson>, StoreError>;

    /// One lesson by id, `None` when the store has no such booking.
    async fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError>;

    /// One user record by id.
    async fn get_user(&self, user_id: &str) -> Result<Party, StoreError>;
}

/// HTTP client for the lesson store REST API.
pub struct LessonStoreClient {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl LessonStoreClient {
    /// Create a client from environment variables.
    pub fn from_env() -> Self {
        dotenv().ok();

        Self::new(
            env::var("LESSON_STORE_ENDPOINT")
                .expect("LESSON_STORE_ENDPOINT must be set in environment"),
            env::var("LESSON_STORE_API_TOKEN").ok(),
        )
    }

    pub fn new(endpoint: String, api_token: Option<String>) -> Self {
        Self {
            client: http_client(),
            endpoint,
            api_token,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        debug!("Lesson store request: {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[async_trait]
impl LessonDirectory for LessonStoreClient {
    async fn list_confirmed_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        info!("Fetching confirmed lessons from store");
        let res = self.get("/lessons?status=confirmed").send().await?;

        if !res.status().is_success() {
            return Err(StoreError::Unexpected {
                status: res.status().as_u16(),
            });
        }

        let lessons = res.json::<Vec<Lesson>>().await?;
        info!("Lesson store returned {} confirmed lessons", lessons.len());
        Ok(lessons)
    }

    async fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError> {
        let res = self.get(&format!("/lessons/{}", lesson_id)).send().await?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(res.json::<Lesson>().await?)),
            status => Err(StoreError::Unexpected {
                status: status.as_u16(),
            }),
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Party, StoreError> {
        let res = self.get(&format!("/users/{}", user_id)).send().await?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            }),
            status if status.is_success() => Ok(res.json::<Party>().await?),
            status => Err(StoreError::Unexpected {
                status: status.as_u16(),
            }),
        }
    }
}
