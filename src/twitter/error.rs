use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unable to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Random source unavailable, refusing to generate a nonce: {0}")]
    Nonce(#[source] rand::Error),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),
    #[error("Bearer authentication requested but no bearer token is configured")]
    MissingBearerToken,
    #[error("Response was not successful: {status}\n{message}")]
    Status { status: u16, message: String },
    #[error("Item {0} no longer exists")]
    NotFound(u64),
    #[error("Still rate limited after {waits} waits, giving up")]
    RateLimited { waits: u32 },
    #[error("Unusable signing key: {0}")]
    SigningKey(String),
    #[error("Pagination cursor did not decrease: page at cursor {cursor} holds id {max_id}")]
    CursorStalled { cursor: u64, max_id: u64 },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Whether fetching the same page again could succeed. A server that
    /// breaks the cursor ordering will not mend itself on a retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ApiError::CursorStalled { .. }
                | ApiError::InvalidEndpoint(_)
                | ApiError::MissingBearerToken
                | ApiError::SigningKey(_)
        )
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
