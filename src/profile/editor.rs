use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{Profile, ProfilePatch, RowStore, PROFILE_TABLE};
use crate::error::{Result, WallError, WriteError};

pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_BIO_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    pub name: String,
    pub bio: String,
    pub bio_is_placeholder: bool,
    pub editing_name: bool,
    pub editing_bio: bool,
}

struct ProfileState {
    id: Option<Uuid>,
    name: String,
    bio: String,
    editing_name: bool,
    editing_bio: bool,
}

/// Name and bio of the singleton profile row, each with its own edit toggle.
///
/// The row id is learnt from the first load or the first insert; every later save
/// is an update of that id.
#[derive(Clone)]
pub struct ProfileEditor {
    rows: Arc<dyn RowStore>,
    default_name: String,
    bio_placeholder: String,
    state: Arc<Mutex<ProfileState>>,
}

impl ProfileEditor {
    pub fn new(
        rows: Arc<dyn RowStore>,
        default_name: impl Into<String>,
        bio_placeholder: impl Into<String>,
    ) -> Self {
        let default_name = default_name.into();
        let bio_placeholder = bio_placeholder.into();
        let state = ProfileState {
            id: None,
            name: default_name.clone(),
            bio: bio_placeholder.clone(),
            editing_name: false,
            editing_bio: false,
        };
        Self {
            rows,
            default_name,
            bio_placeholder,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Picks up the stored profile, if any. Failures keep the defaults.
    pub async fn load(&self) -> bool {
        match self.rows.fetch_profile().await {
            Ok(Some(profile)) => {
                let mut st = self.state.lock().await;
                self.apply(&mut st, profile);
                debug!(profile_id = ?st.id, "profile loaded");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "profile load failed; using defaults");
                false
            }
        }
    }

    pub async fn card(&self) -> ProfileCard {
        let st = self.state.lock().await;
        ProfileCard {
            name: st.name.clone(),
            bio: st.bio.clone(),
            bio_is_placeholder: st.bio == self.bio_placeholder,
            editing_name: st.editing_name,
            editing_bio: st.editing_bio,
        }
    }

    pub async fn profile_id(&self) -> Option<Uuid> {
        self.state.lock().await.id
    }

    /// Opens the name editor; returns the text the input starts with.
    pub async fn begin_name_edit(&self) -> String {
        let mut st = self.state.lock().await;
        st.editing_name = true;
        st.name.clone()
    }

    pub async fn cancel_name_edit(&self) {
        self.state.lock().await.editing_name = false;
    }

    /// Opens the bio editor. The placeholder is not offered as text to edit.
    pub async fn begin_bio_edit(&self) -> String {
        let mut st = self.state.lock().await;
        st.editing_bio = true;
        if st.bio == self.bio_placeholder {
            String::new()
        } else {
            st.bio.clone()
        }
    }

    pub async fn cancel_bio_edit(&self) {
        self.state.lock().await.editing_bio = false;
    }

    #[instrument(skip(self, input))]
    pub async fn save_name(&self, input: &str) -> Result<ProfileCard> {
        let name = input.trim();
        if name.is_empty() {
            return Err(WallError::validation("Name cannot be empty."));
        }
        let patch = ProfilePatch {
            name: Some(name.to_string()),
            bio: None,
        };
        self.save(patch, |st| st.editing_name = false).await
    }

    /// Blank input stores the placeholder.
    #[instrument(skip(self, input))]
    pub async fn save_bio(&self, input: &str) -> Result<ProfileCard> {
        let bio = match input.trim() {
            "" => self.bio_placeholder.clone(),
            bio => bio.to_string(),
        };
        let patch = ProfilePatch {
            name: None,
            bio: Some(bio),
        };
        self.save(patch, |st| st.editing_bio = false).await
    }

    async fn save(
        &self,
        patch: ProfilePatch,
        close: impl FnOnce(&mut ProfileState),
    ) -> Result<ProfileCard> {
        // held across the remote call so two first saves cannot both insert
        let mut st = self.state.lock().await;

        let saved = match st.id {
            Some(id) => match self.rows.update_profile(id, &patch).await {
                Ok(Some(profile)) => Ok(profile),
                Ok(None) => {
                    warn!(%id, "profile row vanished; inserting a new one");
                    self.insert(&patch).await
                }
                Err(e) => Err(WriteError::new(PROFILE_TABLE, "update", e)),
            },
            None => self.insert(&patch).await,
        }
        .map_err(WallError::SaveFailed)?;

        info!(profile_id = %saved.id, "profile saved");
        self.apply(&mut st, saved);
        close(&mut st);
        drop(st);
        Ok(self.card().await)
    }

    async fn insert(&self, patch: &ProfilePatch) -> std::result::Result<Profile, WriteError> {
        self.rows
            .insert_profile(patch)
            .await
            .map_err(|e| WriteError::new(PROFILE_TABLE, "insert", e))
    }

    fn apply(&self, st: &mut ProfileState, profile: Profile) {
        st.id = Some(profile.id);
        st.name = profile
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.default_name.clone());
        st.bio = profile
            .bio
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| self.bio_placeholder.clone());
    }
}
