use shared::domain::{RecordId, Student, StudentPatch};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    draft::{validate_draft, Draft, ValidationError},
    RecordApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Viewing,
    Editing,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no record with id {0}")]
    UnknownRecord(RecordId),
    #[error("record {0} is not being edited")]
    NotEditing(RecordId),
    #[error("failed to {action}: {message}")]
    Request {
        action: &'static str,
        message: String,
    },
}

impl ControllerError {
    fn request(action: &'static str, err: anyhow::Error) -> Self {
        Self::Request {
            action,
            message: format!("{err:#}"),
        }
    }
}

/// Client-side view of the record collection. Every mutation goes through the
/// [`RecordApi`] first and only touches local state once the server accepted it.
pub struct StudentController<A> {
    api: A,
    all_records: Vec<Student>,
    visible_records: Vec<Student>,
    search_term: String,
    draft: Draft,
    editing_id: Option<RecordId>,
    error: Option<String>,
    loaded: bool,
}

impl<A: RecordApi> StudentController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            all_records: Vec::new(),
            visible_records: Vec::new(),
            search_term: String::new(),
            draft: Draft::default(),
            editing_id: None,
            error: None,
            loaded: false,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn all_records(&self) -> &[Student] {
        &self.all_records
    }

    pub fn visible_records(&self) -> &[Student] {
        &self.visible_records
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// The add form. Cleared after a successful add, kept after a failed one.
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn editing_id(&self) -> Option<&RecordId> {
        self.editing_id.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn row_state(&self, id: &RecordId) -> RowState {
        if self.editing_id.as_ref() == Some(id) {
            RowState::Editing
        } else {
            RowState::Viewing
        }
    }

    pub async fn load(&mut self) -> Result<(), ControllerError> {
        let records = match self.api.list_records().await {
            Ok(records) => records,
            Err(err) => return Err(self.fail(ControllerError::request("load records", err))),
        };
        info!(count = records.len(), "records loaded");
        self.visible_records = filter_records(&records, &self.search_term);
        self.all_records = records;
        self.loaded = true;
        self.error = None;
        Ok(())
    }

    /// Validates `draft`, creates the record and appends it to both collections.
    pub async fn add_record(&mut self, draft: Draft) -> Result<Student, ControllerError> {
        let fields = match validate_draft(&draft) {
            Ok(fields) => fields,
            Err(err) => {
                self.draft = draft;
                return Err(self.fail(err.into()));
            }
        };
        let created = match self.api.create_record(&fields).await {
            Ok(created) => created,
            Err(err) => {
                self.draft = draft;
                return Err(self.fail(ControllerError::request("add record", err)));
            }
        };

        info!(id = %created.id, "record added");
        self.all_records.push(created.clone());
        self.visible_records.push(created.clone());
        self.draft = Draft::default();
        self.error = None;
        Ok(created)
    }

    /// Enters edit mode for `id` and returns a draft pre-filled from the record.
    pub fn begin_edit(&mut self, id: &RecordId) -> Result<Draft, ControllerError> {
        let Some(record) = self.all_records.iter().find(|r| &r.id == id) else {
            return Err(self.fail(ControllerError::UnknownRecord(id.clone())));
        };
        let draft = Draft::from(record);
        self.editing_id = Some(id.clone());
        Ok(draft)
    }

    pub fn cancel_edit(&mut self) {
        self.editing_id = None;
        self.error = None;
    }

    pub async fn save_edit(&mut self, id: &RecordId, draft: &Draft) -> Result<(), ControllerError> {
        if self.editing_id.as_ref() != Some(id) {
            return Err(self.fail(ControllerError::NotEditing(id.clone())));
        }
        let patch = match validate_draft(draft) {
            Ok(fields) => StudentPatch::from(fields),
            Err(err) => return Err(self.fail(err.into())),
        };
        if let Err(err) = self.api.update_record(id, &patch).await {
            return Err(self.fail(ControllerError::request("save record", err)));
        }

        info!(%id, "record updated");
        for record in self
            .all_records
            .iter_mut()
            .chain(self.visible_records.iter_mut())
            .filter(|r| &r.id == id)
        {
            record.apply(&patch);
        }
        self.editing_id = None;
        self.error = None;
        Ok(())
    }

    /// Deletes `id` on the server, then drops it locally. Unknown ids are not an error.
    pub async fn remove_record(&mut self, id: &RecordId) -> Result<(), ControllerError> {
        if let Err(err) = self.api.delete_record(id).await {
            return Err(self.fail(ControllerError::request("delete record", err)));
        }

        info!(%id, "record deleted");
        self.all_records.retain(|r| &r.id != id);
        self.visible_records.retain(|r| &r.id != id);
        if self.editing_id.as_ref() == Some(id) {
            self.editing_id = None;
        }
        self.error = None;
        Ok(())
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.visible_records = filter_records(&self.all_records, term);
    }

    fn fail(&mut self, err: ControllerError) -> ControllerError {
        warn!(error = %err, "record action failed");
        self.error = Some(err.to_string());
        err
    }
}

/// Case-insensitive match on the name, or substring match on the decimal roll number.
/// Whitespace only decides whether the term is blank; otherwise it is matched as typed.
pub fn matches_search(student: &Student, term: &str) -> bool {
    if term.trim().is_empty() {
        return true;
    }
    student.name.to_lowercase().contains(&term.to_lowercase())
        || student.roll_no.to_string().contains(term)
}

pub fn filter_records(records: &[Student], term: &str) -> Vec<Student> {
    records
        .iter()
        .filter(|student| matches_search(student, term))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
