use chrono::{DateTime, Utc};
use crud_kit::entry::new_entry_id;
use crud_kit::{CrudError, IdEntry, UserBoundEntry, UserBoundTransformer};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdEntry for Note {
    const KIND: &'static str = "Note";

    fn id(&self) -> &str {
        &self.id
    }
}

impl UserBoundEntry for Note {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNote {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 100_000))]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
}

/// Full replacement of the editable fields.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateNote {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 100_000))]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteTransformer;

impl UserBoundTransformer for NoteTransformer {
    type Create = CreateNote;
    type Update = UpdateNote;
    type Entry = Note;
    type Result = Note;

    fn create_entry(&self, user_id: &str, create: CreateNote) -> Result<Note, CrudError> {
        let now = Utc::now();
        Ok(Note {
            id: new_entry_id(),
            user_id: user_id.to_string(),
            title: create.title,
            body: create.body,
            tags: create.tags,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_entry(&self, existing: Note, update: UpdateNote) -> Result<Note, CrudError> {
        Ok(Note {
            title: update.title,
            body: update.body,
            tags: update.tags,
            updated_at: Utc::now(),
            ..existing
        })
    }

    fn to_result(&self, entry: Note) -> Note {
        entry
    }
}
