use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::account::requests::{LoginRequest, RegisterRequest};
use crate::models::account::responses::{ApiErrorBody, ApiMessage, UserDetails, UserEmail};
use crate::models::error::{CompanionError, Result};
use crate::models::location_log::LocationReport;

pub const LOGIN_PATH: &str = "login";
pub const REGISTER_PATH: &str = "register";
pub const USER_DETAILS_PATH: &str = "get_user_details";
pub const USER_EMAIL_PATH: &str = "get_user_email";
pub const LOCATION_PATH: &str = "user/api/location";

/// Where tracked samples go.
#[async_trait]
pub trait LocationSink: Send + Sync {
    async fn report_location(&self, report: &LocationReport) -> Result<()>;
}

/// Account calls go through this seam so the flows can be driven without a backend.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<()>;
    async fn register(&self, request: &RegisterRequest) -> Result<ApiMessage>;
    async fn user_details(&self, mobile: &str) -> Result<UserDetails>;
    async fn user_email(&self, mobile: &str) -> Result<UserEmail>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    api_url: String,
    ingest_url: String,
}

impl BackendClient {
    pub fn new(api_url: impl Into<String>, ingest_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_url: api_url.into(), ingest_url: ingest_url.into() })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_url.clone(), config.ingest_url.clone(), config.http_timeout)
    }

    fn api(&self, path: &str) -> String {
        join(&self.api_url, path)
    }

    fn ingest(&self, path: &str) -> String {
        join(&self.ingest_url, path)
    }

    /// Turns a non-2xx response into `ServerError`, keeping the `{error}` body if there is one.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        debug!("Backend returned {}: {}", status, body);

        Err(CompanionError::ServerError { status: status.as_u16(), message })
    }
}

#[async_trait]
impl AccountApi for BackendClient {
    async fn login(&self, request: &LoginRequest) -> Result<()> {
        let response = self.http.post(self.api(LOGIN_PATH)).json(request).send().await?;
        Self::check(response).await?;
        info!("Logged in as {}", request.mobile);
        Ok(())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<ApiMessage> {
        let response = self.http.post(self.api(REGISTER_PATH)).json(request).send().await?;
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    async fn user_details(&self, mobile: &str) -> Result<UserDetails> {
        let response = self
            .http
            .get(self.api(USER_DETAILS_PATH))
            .query(&[("mobile", mobile)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn user_email(&self, mobile: &str) -> Result<UserEmail> {
        let response = self
            .http
            .get(self.api(USER_EMAIL_PATH))
            .query(&[("mobile", mobile)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl LocationSink for BackendClient {
    async fn report_location(&self, report: &LocationReport) -> Result<()> {
        let response = self.http.post(self.ingest(LOCATION_PATH)).json(report).send().await?;
        let ack = Self::check(response).await?.text().await.unwrap_or_default();
        debug!("Location sent to backend: {}", ack);
        Ok(())
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}
