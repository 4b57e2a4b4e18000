//! The profile sidebar: name, bio, personal details and photo.

use std::str::FromStr;

use axum::Router;
use serde::Serialize;

use crate::error::WallError;
use crate::state::AppState;

mod dto;
pub mod editor;
pub mod handlers;
pub mod info;
pub mod photo;

/// Independently editable parts of the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldGroup {
    Name,
    Bio,
    Info,
}

impl FromStr for FieldGroup {
    type Err = WallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(FieldGroup::Name),
            "bio" => Ok(FieldGroup::Bio),
            "info" => Ok(FieldGroup::Info),
            other => Err(WallError::UnknownGroup(other.to_string())),
        }
    }
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::FieldGroup;

    #[test]
    fn field_group_parses_lowercase_only() {
        assert_eq!("bio".parse::<FieldGroup>().unwrap(), FieldGroup::Bio);
        assert!("Bio".parse::<FieldGroup>().is_err());
        assert_eq!(serde_json::to_string(&FieldGroup::Info).unwrap(), "\"info\"");
    }
}
