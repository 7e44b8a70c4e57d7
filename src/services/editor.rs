use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::form::{FieldDefinition, FieldPatch, FieldType, FormConfiguration};
use crate::services::database::FormDatabase;
use crate::services::refresh::RefreshCoordinator;

pub const NEW_FIELD_LABEL: &str = "Nuevo Campo";
pub const SAVED_MESSAGE: &str = "Configuración guardada exitosamente";
pub const FIELD_ADDED_MESSAGE: &str = "Campo agregado. Recuerda guardar los cambios.";

/// Admin editing session over the active configuration's field list.
/// Every mutation is pure in-memory until `save`; the renderer is only
/// signalled when the session closes or navigates away, so an edit
/// session causes at most one reload no matter how many fields changed.
pub struct EditorSession {
    database: Arc<FormDatabase>,
    config_id: Option<String>,
    fields: Vec<FieldDefinition>,
    pending_refresh: bool,
    message: Option<String>,
}

impl EditorSession {
    pub fn new(database: Arc<FormDatabase>) -> Self {
        Self {
            database,
            config_id: None,
            fields: Vec::new(),
            pending_refresh: false,
            message: None,
        }
    }

    /// Load the active configuration, capturing its id for later saves.
    /// An absent configuration leaves an empty, unsavable field list.
    pub fn load(&mut self) -> Result<(), String> {
        let config = self.database.get_active_configuration().map_err(|e| {
            error!("Error loading configuration: {}", e);
            e
        })?;

        match config {
            Some(config) => {
                self.config_id = Some(config.id);
                self.fields = config.fields;
            }
            None => {
                self.config_id = None;
                self.fields.clear();
            }
        }

        Ok(())
    }

    /// Append a fresh field with a generated unique name and defaults:
    /// text type, optional, enabled.
    pub fn add_field(&mut self) -> &FieldDefinition {
        let field = FieldDefinition {
            name: unique_field_name(&self.fields),
            label: NEW_FIELD_LABEL.to_string(),
            field_type: FieldType::Text,
            required: false,
            enabled: true,
        };
        self.fields.push(field);
        self.show_message(FIELD_ADDED_MESSAGE);

        let index = self.fields.len() - 1;
        &self.fields[index]
    }

    /// Shallow-merge a patch into the field at `index`. A rename that
    /// would collide with another field's name is rejected, since `name`
    /// is the binding key for submitted values.
    pub fn update_field(&mut self, index: usize, patch: FieldPatch) -> Result<(), String> {
        if index >= self.fields.len() {
            return Err(format!("No field at index {}", index));
        }

        if let Some(name) = &patch.name {
            let duplicate = self
                .fields
                .iter()
                .enumerate()
                .any(|(i, f)| i != index && f.name == *name);
            if duplicate {
                return Err(format!("Field name {} is already in use", name));
            }
        }

        let field = &mut self.fields[index];
        if let Some(name) = patch.name {
            field.name = name;
        }
        if let Some(label) = patch.label {
            field.label = label;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(enabled) = patch.enabled {
            field.enabled = enabled;
        }

        Ok(())
    }

    /// Remove by position; out-of-range indices are ignored. Irreversible
    /// once saved.
    pub fn remove_field(&mut self, index: usize) {
        if index < self.fields.len() {
            self.fields.remove(index);
        }
    }

    /// Flip a field's enabled flag. Disabled fields are hidden from the
    /// renderer and excluded from required validation, but values already
    /// typed for them are not cleared.
    pub fn toggle_enabled(&mut self, index: usize) {
        if let Some(field) = self.fields.get_mut(index) {
            field.enabled = !field.enabled;
        }
    }

    /// Persist the whole field list for the configuration id captured at
    /// load time. Success arms the pending-refresh flag; failure leaves
    /// local state unchanged, nothing was applied anywhere else.
    pub fn save(&mut self) -> Result<FormConfiguration, String> {
        let id = self
            .config_id
            .clone()
            .ok_or_else(|| "No active configuration loaded".to_string())?;

        match self.database.update_configuration(&id, self.fields.clone()) {
            Ok(Some(updated)) => {
                info!("Saved configuration {}", updated.id);
                self.pending_refresh = true;
                self.show_message(SAVED_MESSAGE);
                Ok(updated)
            }
            Ok(None) => {
                let message = format!("Configuration {} no longer exists", id);
                error!("Error saving configuration: {}", message);
                Err(message)
            }
            Err(e) => {
                error!("Error saving configuration: {}", e);
                Err(e)
            }
        }
    }

    /// Explicit close: flush the pending refresh (if armed) to the
    /// coordinator so the renderer reloads exactly once.
    pub fn close(&mut self, coordinator: &RefreshCoordinator) {
        self.flush_refresh(coordinator);
        self.message = None;
    }

    /// Navigating from the editor to the history also flushes the
    /// pending refresh, keeping the deferred-reload guarantee.
    pub fn open_history(&mut self, coordinator: &RefreshCoordinator) {
        self.flush_refresh(coordinator);
    }

    fn flush_refresh(&mut self, coordinator: &RefreshCoordinator) {
        if self.pending_refresh {
            coordinator.bump();
            self.pending_refresh = false;
        }
    }

    // Last write wins: a new message replaces whatever was showing.
    fn show_message(&mut self, message: &str) {
        self.message = Some(message.to_string());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn has_pending_refresh(&self) -> bool {
        self.pending_refresh
    }
}

// Timestamp-derived name, suffixed if two fields are added within the
// same millisecond.
fn unique_field_name(fields: &[FieldDefinition]) -> String {
    let base = format!("field_{}", Utc::now().timestamp_millis());
    if !fields.iter().any(|f| f.name == base) {
        return base;
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !fields.iter().any(|f| f.name == candidate) {
            return candidate;
        }
        counter += 1;
    }
}
