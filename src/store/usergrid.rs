//! Usergrid client -- organization login and `requests` collection writes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{RequestStore, StoreError};
use crate::config::StoreConfig;
use crate::queue::TestRequest;

const COLLECTION: &str = "requests";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct RequestEntity<'a> {
    url: &'a str,
    email: &'a str,
}

/// Writes one entity per submitted request to `<base>/<org>/<app>/requests`.
pub struct UsergridStore {
    client: Client,
    collection_url: String,
    access_token: String,
}

impl UsergridStore {
    /// Exchange the organization client credentials for an access token.
    pub async fn login(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = config.base_uri.trim_end_matches('/');

        let response = client
            .post(format!("{base}/management/token"))
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &config.client_id,
                client_secret: &config.client_secret,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(StoreError::Auth("empty access token".to_string()));
        }

        info!(
            organization = %config.organization,
            application = %config.application,
            "Logged in to Usergrid"
        );

        Ok(Self {
            client,
            collection_url: format!(
                "{base}/{}/{}/{COLLECTION}",
                config.organization, config.application
            ),
            access_token: token.access_token,
        })
    }
}

#[async_trait]
impl RequestStore for UsergridStore {
    async fn save(&self, request: &TestRequest) -> Result<(), StoreError> {
        let entity = RequestEntity {
            url: request.target(),
            email: request.email().unwrap_or_default(),
        };
        debug!(?entity, "Saving request");

        let response = self
            .client
            .post(&self.collection_url)
            .bearer_auth(&self.access_token)
            .json(&entity)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(())
    }
}
