use thiserror::Error;

/// Errors from Azure REST calls (identity platform, Monitor, Blob)
#[derive(Error, Debug)]
pub enum AzureError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Azure {service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid Azure URL: {0}")]
    Url(String),

    #[error("Azure credential error: {0}")]
    Credential(String),
}

impl AzureError {
    /// Build a status error, consuming the response body as the reason
    pub async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Self::Status {
            service,
            status,
            body,
        }
    }
}
