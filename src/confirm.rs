use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

pub const CONFIRM_HEADER: &str = "x-wall-confirm";

/// The user's yes/no answer to "are you sure?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Granted,
    Declined,
}

impl Confirmation {
    pub fn granted(self) -> bool {
        self == Confirmation::Granted
    }
}

/// Result of a confirmed action. A declined action is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome<T> {
    Applied(T),
    Declined,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Declined => None,
        }
    }
}

/// Reads `x-wall-confirm`. Anything but an explicit yes counts as declined.
#[async_trait]
impl<S> FromRequestParts<S> for Confirmation
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let answer = parts
            .headers
            .get(CONFIRM_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());

        Ok(match answer.as_deref() {
            Some("yes" | "y" | "true" | "1") => Confirmation::Granted,
            _ => Confirmation::Declined,
        })
    }
}
