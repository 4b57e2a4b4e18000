use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A row of the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for `messages`; `id` and `created_at` come from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub name: String,
    pub text: String,
    pub image_url: Option<String>,
}

/// The singleton `user_profile` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: Option<String>,
    pub bio: Option<String>,
}

/// Fields written by a profile save. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub bio: Option<String>,
}

/// Free-form personal details. Blank values are stored as NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct InfoFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub civil: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl InfoFields {
    /// Trims every field and turns blank input into `None`.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            dob: clean(self.dob),
            gender: clean(self.gender),
            civil: clean(self.civil),
            email: clean(self.email),
            phone: clean(self.phone),
            city: clean(self.city),
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.dob,
            &self.gender,
            &self.civil,
            &self.email,
            &self.phone,
            &self.city,
        ]
        .iter()
        .all(|f| f.is_none())
    }
}

/// The singleton `user_info` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PersonalInfo {
    pub id: Uuid,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: InfoFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_drops_blank_fields() {
        let info = InfoFields {
            dob: Some("1990-01-01".into()),
            gender: Some("   ".into()),
            city: Some("  Manila ".into()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(info.dob.as_deref(), Some("1990-01-01"));
        assert_eq!(info.gender, None);
        assert_eq!(info.city.as_deref(), Some("Manila"));
        assert!(!info.is_empty());
        assert!(InfoFields::default().is_empty());
    }

    #[test]
    fn personal_info_serializes_flat() {
        let info = PersonalInfo {
            id: Uuid::nil(),
            fields: InfoFields {
                email: Some("me@example.com".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["email"], "me@example.com");
        assert!(json.get("phone").is_none());
    }
}
