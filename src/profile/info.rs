use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::backend::{InfoFields, PersonalInfo, RowStore, INFO_TABLE};
use crate::confirm::{Confirmation, Outcome};
use crate::error::{Result, WallError, WriteError};

#[derive(Default)]
struct InfoState {
    id: Option<Uuid>,
    saved: Option<InfoFields>,
    editing: bool,
}

/// Personal details of the singleton `user_info` row.
#[derive(Clone)]
pub struct InfoEditor {
    rows: Arc<dyn RowStore>,
    state: Arc<Mutex<InfoState>>,
}

impl InfoEditor {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self {
            rows,
            state: Arc::new(Mutex::new(InfoState::default())),
        }
    }

    pub async fn load(&self) -> bool {
        match self.rows.fetch_info().await {
            Ok(Some(row)) => {
                let mut st = self.state.lock().await;
                st.id = Some(row.id);
                st.saved = Some(row.fields);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "personal info load failed");
                false
            }
        }
    }

    /// Last saved details with at least one field set.
    pub async fn saved(&self) -> Option<InfoFields> {
        self.state
            .lock()
            .await
            .saved
            .clone()
            .filter(|f| !f.is_empty())
    }

    pub async fn is_editing(&self) -> bool {
        self.state.lock().await.editing
    }

    /// Opens the form, pre-filled with what was last saved.
    pub async fn begin_edit(&self) -> InfoFields {
        let mut st = self.state.lock().await;
        st.editing = true;
        st.saved.clone().unwrap_or_default()
    }

    pub async fn cancel_edit(&self) {
        self.state.lock().await.editing = false;
    }

    #[instrument(skip(self, fields))]
    pub async fn save(
        &self,
        fields: InfoFields,
        confirmation: Confirmation,
    ) -> Result<Outcome<InfoFields>> {
        if !confirmation.granted() {
            return Ok(Outcome::Declined);
        }
        let fields = fields.normalized();

        let mut st = self.state.lock().await;
        let row = match st.id {
            Some(id) => match self.rows.update_info(id, &fields).await {
                Ok(Some(row)) => Ok(row),
                Ok(None) => {
                    warn!(%id, "personal info row vanished; inserting a new one");
                    self.insert(&fields).await
                }
                Err(e) => Err(WriteError::new(INFO_TABLE, "update", e)),
            },
            None => self.insert(&fields).await,
        }
        .map_err(WallError::SaveFailed)?;

        info!(info_id = %row.id, "personal info saved");
        st.id = Some(row.id);
        st.saved = Some(row.fields.clone());
        st.editing = false;
        Ok(Outcome::Applied(row.fields))
    }

    async fn insert(&self, fields: &InfoFields) -> std::result::Result<PersonalInfo, WriteError> {
        self.rows
            .insert_info(fields)
            .await
            .map_err(|e| WriteError::new(INFO_TABLE, "insert", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn fields(city: &str) -> InfoFields {
        InfoFields {
            email: Some("me@example.com".into()),
            city: Some(city.into()),
            gender: Some("".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_inserts_once_then_updates() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let editor = InfoEditor::new(mem.clone());
        assert_eq!(editor.begin_edit().await, InfoFields::default());

        let saved = editor
            .save(fields("Cebu"), Confirmation::Granted)
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(saved.gender, None);
        assert!(!editor.is_editing().await);
        let first = mem.fetch_info().await.unwrap().unwrap();

        editor
            .save(fields("Davao"), Confirmation::Granted)
            .await
            .unwrap();
        let second = mem.fetch_info().await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.fields.city.as_deref(), Some("Davao"));
        assert_eq!(editor.saved().await.unwrap().city.as_deref(), Some("Davao"));
    }

    #[tokio::test]
    async fn declined_save_does_nothing() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let editor = InfoEditor::new(mem.clone());
        editor.begin_edit().await;
        let out = editor
            .save(fields("Cebu"), Confirmation::Declined)
            .await
            .unwrap();
        assert_eq!(out, Outcome::Declined);
        assert_eq!(mem.calls(), 0);
        assert!(editor.is_editing().await);
    }

    #[tokio::test]
    async fn failure_surfaces_and_keeps_form_open() {
        let mem = MemoryBackend::new("http://localhost/storage");
        let editor = InfoEditor::new(mem.clone());
        editor.begin_edit().await;
        mem.fail_writes(true);
        let err = editor
            .save(fields("Cebu"), Confirmation::Granted)
            .await
            .unwrap_err();
        assert!(matches!(err, WallError::SaveFailed(_)));
        assert!(editor.is_editing().await);
        assert_eq!(editor.saved().await, None);
    }

    #[tokio::test]
    async fn load_and_empty_details_are_hidden() {
        let mem = MemoryBackend::new("http://localhost/storage");
        mem.insert_info(&InfoFields::default()).await.unwrap();
        let editor = InfoEditor::new(mem.clone());
        assert!(editor.load().await);
        assert_eq!(editor.saved().await, None);
    }
}
