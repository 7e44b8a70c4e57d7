use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::form::{FormSubmission, SubmissionUpdate};
use crate::services::database::{FormDatabase, PAGE_SIZE};
use crate::services::export::{self, ExportFile};

pub const UPDATED_MESSAGE: &str = "Registro actualizado correctamente";
pub const DELETED_MESSAGE: &str = "Registro eliminado correctamente";
pub const UNDONE_MESSAGE: &str = "Eliminación deshecha";
pub const UPDATE_FAILED_MESSAGE: &str = "No se pudo actualizar el registro.";
pub const DELETE_FAILED_MESSAGE: &str = "No se pudo eliminar el registro.";
pub const MISSING_RANGE_MESSAGE: &str = "Por favor selecciona ambas fechas (desde y hasta)";
pub const INVERTED_RANGE_MESSAGE: &str = "La fecha de inicio debe ser anterior a la fecha de fin";
pub const EMPTY_RANGE_MESSAGE: &str =
    "No se encontraron registros en el rango de fechas seleccionado";

/// Paginated, searchable view over the submission history with inline
/// edit, a single-slot delete undo, and spreadsheet export.
pub struct HistoryView {
    database: Arc<FormDatabase>,
    submissions: Vec<FormSubmission>,
    total_count: usize,
    current_page: usize,
    search_term: String,
    last_deleted: Option<FormSubmission>,
    message: Option<String>,
}

impl HistoryView {
    pub fn new(database: Arc<FormDatabase>) -> Self {
        Self {
            database,
            submissions: Vec::new(),
            total_count: 0,
            current_page: 0,
            search_term: String::new(),
            last_deleted: None,
            message: None,
        }
    }

    /// Fetch the current page from scratch. Any change to the page or
    /// the search term re-queries; nothing is cached or merged.
    pub fn load(&mut self) -> Result<(), String> {
        let (submissions, total) = self
            .database
            .list_submissions(self.current_page, &self.search_term)
            .map_err(|e| {
                error!("Error loading submissions: {}", e);
                e
            })?;

        self.submissions = submissions;
        self.total_count = total;
        Ok(())
    }

    /// A new search term always returns the view to the first page
    /// before the fetch fires.
    pub fn set_search(&mut self, term: &str) -> Result<(), String> {
        self.search_term = term.to_string();
        self.current_page = 0;
        self.load()
    }

    pub fn set_page(&mut self, page: usize) -> Result<(), String> {
        self.current_page = page;
        self.load()
    }

    pub fn next_page(&mut self) -> Result<(), String> {
        if self.current_page + 1 < self.total_pages() {
            self.current_page += 1;
            self.load()?;
        }
        Ok(())
    }

    pub fn prev_page(&mut self) -> Result<(), String> {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.load()?;
        }
        Ok(())
    }

    pub fn total_pages(&self) -> usize {
        (self.total_count + PAGE_SIZE - 1) / PAGE_SIZE
    }

    /// Pre-filled edit payload for the modal, fixed editable subset only.
    pub fn edit_draft(&self, id: &str) -> Option<SubmissionUpdate> {
        let submission = self.submissions.iter().find(|s| s.id == id)?;
        Some(SubmissionUpdate {
            instagram: Some(submission.instagram.clone()),
            recipient_name: Some(submission.recipient_name.clone()),
            desired_date: Some(submission.desired_date.clone()),
            desired_time: Some(submission.desired_time.clone()),
            address: Some(submission.address.clone()),
            additional_notes: Some(submission.additional_notes.clone()),
            coupon_code: Some(submission.coupon_code.clone().unwrap_or_default()),
        })
    }

    /// Persist an edit and fold the returned record back into the list
    /// entry in place, so fields outside the edit form (like
    /// `created_at`) are preserved. The coupon code is uppercased the
    /// same way the input control forces it.
    pub fn save_edit(
        &mut self,
        id: &str,
        mut draft: SubmissionUpdate,
    ) -> Result<FormSubmission, String> {
        draft.coupon_code = draft.coupon_code.map(|c| c.to_uppercase());

        match self.database.update_submission(id, &draft) {
            Ok(Some(updated)) => {
                if let Some(entry) = self.submissions.iter_mut().find(|s| s.id == updated.id) {
                    *entry = updated.clone();
                }
                self.show_message(UPDATED_MESSAGE);
                Ok(updated)
            }
            Ok(None) => {
                error!("Error updating submission: {} not found", id);
                Err(UPDATE_FAILED_MESSAGE.to_string())
            }
            Err(e) => {
                error!("Error updating submission: {}", e);
                Err(UPDATE_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Delete a record and retain its snapshot as the single most-recent
    /// deletion. A newer delete silently discards the older snapshot;
    /// only one level of undo is kept.
    pub fn delete(&mut self, id: &str) -> Result<FormSubmission, String> {
        match self.database.delete_submission(id) {
            Ok(Some(snapshot)) => {
                self.submissions.retain(|s| s.id != id);
                self.total_count = self.total_count.saturating_sub(1);
                self.last_deleted = Some(snapshot.clone());
                self.show_message(DELETED_MESSAGE);
                Ok(snapshot)
            }
            Ok(None) => {
                error!("Error deleting submission: {} not found", id);
                Err(DELETE_FAILED_MESSAGE.to_string())
            }
            Err(e) => {
                error!("Error deleting submission: {}", e);
                Err(DELETE_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Best-effort compensating action: re-insert the retained snapshot
    /// verbatim and prepend it to the current page. Returns None when
    /// there is nothing to undo.
    pub fn undo_delete(&mut self) -> Result<Option<FormSubmission>, String> {
        let Some(snapshot) = self.last_deleted.take() else {
            return Ok(None);
        };

        match self.database.restore_submission(&snapshot) {
            Ok(restored) => {
                self.submissions.insert(0, restored.clone());
                self.total_count += 1;
                self.show_message(UNDONE_MESSAGE);
                info!("Restored submission {}", restored.id);
                Ok(Some(restored))
            }
            Err(e) => {
                error!("Error restoring submission: {}", e);
                // Keep the snapshot so the user can retry
                self.last_deleted = Some(snapshot);
                Err(e)
            }
        }
    }

    /// Export one record from the current page.
    pub fn export_one(&self, id: &str) -> Result<ExportFile, String> {
        let submission = self
            .submissions
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| format!("No submission {} in the current page", id))?;

        export::single_export(submission)
    }

    /// Export every submission in an inclusive date range. Both bounds
    /// are required and must be ordered; constraint failures and empty
    /// results are reported before any file is generated.
    pub fn export_range(&mut self, start: &str, end: &str) -> Result<ExportFile, String> {
        let (start, end) = parse_range(start, end)?;

        let submissions = self.database.submissions_in_range(start, end)?;

        if submissions.is_empty() {
            return Err(EMPTY_RANGE_MESSAGE.to_string());
        }

        let file = export::range_export(&submissions, start, end)?;
        self.show_message(format!("Descargados {} registros", submissions.len()));
        Ok(file)
    }

    fn show_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn submissions(&self) -> &[FormSubmission] {
        &self.submissions
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn last_deleted(&self) -> Option<&FormSubmission> {
        self.last_deleted.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Shared range validation: both dates present, parseable, and in order.
pub fn parse_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), String> {
    if start.is_empty() || end.is_empty() {
        return Err(MISSING_RANGE_MESSAGE.to_string());
    }

    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|e| format!("Fecha inválida: {}", e))?;
    let end =
        NaiveDate::parse_from_str(end, "%Y-%m-%d").map_err(|e| format!("Fecha inválida: {}", e))?;

    if start > end {
        return Err(INVERTED_RANGE_MESSAGE.to_string());
    }

    Ok((start, end))
}
