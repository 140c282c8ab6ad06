//! HTTP adapters for concrete chat completion services.

#[cfg(feature = "backend-ollama")]
pub mod ollama;

#[cfg(feature = "backend-openai")]
pub mod openai;

#[cfg(any(feature = "backend-ollama", feature = "backend-openai"))]
mod http {
    use reqwest::StatusCode;

    use crate::BackendError;

    /// Maps an unsuccessful HTTP status to a backend error kind.
    pub(crate) fn classify_status(status: StatusCode, message: String) -> BackendError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BackendError::authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => BackendError::rate_limited(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                BackendError::timeout(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                BackendError::invalid_request(message)
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                BackendError::unavailable(message)
            }
            _ => BackendError::transport(message),
        }
    }

    pub(crate) fn classify_reqwest_error(error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::timeout(error.to_string())
        } else {
            BackendError::transport(error.to_string())
        }
    }

    pub(crate) fn truncate_body(input: &str, max: usize) -> String {
        if input.len() <= max {
            return input.to_string();
        }

        let mut output = input
            .char_indices()
            .take_while(|(index, _)| *index < max)
            .map(|(_, character)| character)
            .collect::<String>();
        output.push_str("...");
        output
    }
}

#[cfg(any(feature = "backend-ollama", feature = "backend-openai"))]
pub(crate) use http::{classify_reqwest_error, classify_status, truncate_body};
