use serde::{Deserialize, Serialize};

use super::FieldGroup;
use crate::backend::InfoFields;

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub bio: String,
    pub bio_is_placeholder: bool,
    pub photo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoFields>,
    pub editing: Vec<FieldGroup>,
}

/// What an edit control starts with.
#[derive(Debug, Serialize)]
pub struct BeginEditView {
    pub group: FieldGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoFields>,
}

#[derive(Debug, Deserialize)]
pub struct SaveNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveBioRequest {
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoView {
    pub photo_url: String,
}
