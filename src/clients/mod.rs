pub mod conference;
pub mod lessons;
pub mod mail;

use std::time::Duration;

// Shared builder so every upstream call carries the same timeout.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
}
