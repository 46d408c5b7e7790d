use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{RecordId, Student, StudentFields, StudentPatch},
    error::{ApiError, ApiException},
    protocol::{RecordIdQuery, SuccessResponse, RECORDS_ROUTE},
};
use tracing::debug;
use url::Url;

pub mod controller;
pub mod draft;

pub use controller::{filter_records, matches_search, ControllerError, RowState, StudentController};
pub use draft::{validate_draft, Draft, ValidationError};

/// The four record operations as seen from the client.
#[async_trait]
pub trait RecordApi: Send + Sync {
    async fn list_records(&self) -> Result<Vec<Student>>;
    async fn create_record(&self, fields: &StudentFields) -> Result<Student>;
    async fn update_record(&self, id: &RecordId, patch: &StudentPatch) -> Result<()>;
    async fn delete_record(&self, id: &RecordId) -> Result<()>;
}

/// HTTP client for the `/records` endpoints.
pub struct RecordsClient {
    http: Client,
    records_url: Url,
}

impl RecordsClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    /// `server_url` may carry a path prefix (`http://host/api`); the records route is
    /// resolved below it.
    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let records_url = base
            .join(RECORDS_ROUTE.trim_start_matches('/'))
            .with_context(|| format!("cannot address {RECORDS_ROUTE} under '{server_url}'"))?;
        Ok(Self { http, records_url })
    }

    pub fn records_url(&self) -> &Url {
        &self.records_url
    }
}

#[async_trait]
impl RecordApi for RecordsClient {
    async fn list_records(&self) -> Result<Vec<Student>> {
        debug!(url = %self.records_url, "listing records");
        let response = self.http.get(self.records_url.clone()).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create_record(&self, fields: &StudentFields) -> Result<Student> {
        let response = self
            .http
            .post(self.records_url.clone())
            .json(fields)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn update_record(&self, id: &RecordId, patch: &StudentPatch) -> Result<()> {
        let response = self
            .http
            .put(self.records_url.clone())
            .query(&id_query(id))
            .json(patch)
            .send()
            .await?;
        expect_success(check(response).await?).await
    }

    async fn delete_record(&self, id: &RecordId) -> Result<()> {
        let response = self
            .http
            .delete(self.records_url.clone())
            .query(&id_query(id))
            .send()
            .await?;
        expect_success(check(response).await?).await
    }
}

fn id_query(id: &RecordId) -> RecordIdQuery {
    RecordIdQuery {
        id: Some(id.to_string()),
    }
}

/// Turns a non-2xx response into an error, preferring the server's `ApiError` body.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => Err(ApiException::from(api_error).into()),
        Err(_) => Err(anyhow!("server returned {status}")),
    }
}

async fn expect_success(response: Response) -> Result<()> {
    let ack: SuccessResponse = response.json().await?;
    if ack.success {
        Ok(())
    } else {
        Err(anyhow!("server did not acknowledge the change"))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
