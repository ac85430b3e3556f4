//! Typed client for the gateway's REST collaborator endpoints.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use banter_shared::constants::UPLOAD_FIELD_NAME;
use banter_shared::protocol::{MarkReadRequest, MarkReadResponse, UploadResponse};
use banter_shared::types::{Message, UserId};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Error body shape produced by the gateway.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ChatApi {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl ChatApi {
    /// `base_url` is the gateway root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the bounded ascending history between two users.
    pub async fn conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<Message>, ApiError> {
        let url = format!(
            "{}/api/chats/conversation/{}/{}",
            self.base_url, user_a, user_b
        );
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch the unread-by-sender map for the authenticated user.
    pub async fn unread_counts(&self) -> Result<HashMap<UserId, u64>, ApiError> {
        let url = format!("{}/api/chats/unreads", self.base_url);
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let raw: HashMap<String, u64> = check(response).await?.json().await?;

        // The wire keys sender ids as strings; parse them back.
        Ok(raw
            .into_iter()
            .filter_map(|(key, count)| match key.parse::<i64>() {
                Ok(id) => Some((UserId(id), count)),
                Err(_) => {
                    tracing::warn!(key, "ignoring non-numeric unread key");
                    None
                }
            })
            .collect())
    }

    /// Bulk-mark the conversation with `other` as read. Returns the
    /// number of rows flipped.
    pub async fn mark_read(&self, other: UserId) -> Result<u64, ApiError> {
        let url = format!("{}/api/chats/mark-read", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&MarkReadRequest {
                other_id: Some(other),
            })
            .send()
            .await?;
        let body: MarkReadResponse = check(response).await?.json().await?;
        Ok(body.updated)
    }

    /// Soft-delete one of the authenticated user's own messages and
    /// return the cleared record.
    pub async fn delete_message(&self, id: i64) -> Result<Message, ApiError> {
        let url = format!("{}/api/chats/message/{}", self.base_url, id);
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Upload an attachment; the gateway replies with a reference URL and
    /// the kind it inferred from the content type.
    pub async fn upload(
        &self,
        filename: impl Into<String>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let url = format!("{}/api/chats/upload", self.base_url);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.into())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD_NAME, part);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn non-2xx responses into [`ApiError::Server`], preserving the
/// gateway's error message when the body carries one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}
