use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::form::{FieldDefinition, FormSubmission, NewSubmission};
use crate::services::database::FormDatabase;
use crate::services::refresh::RefreshCoordinator;

pub const REQUIRED_FIELD_MESSAGE: &str = "Este campo es obligatorio";

const FIXED_COLUMNS: [&str; 6] = [
    "instagram",
    "recipient_name",
    "desired_date",
    "desired_time",
    "address",
    "additional_notes",
];

/// Lifecycle of the rendered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Submitting,
    SuccessBanner,
}

/// State container for one end-user form: the field list of the active
/// configuration, the typed values keyed by field name, and the
/// field-keyed validation errors.
pub struct FormSession {
    database: Arc<FormDatabase>,
    fields: Vec<FieldDefinition>,
    values: HashMap<String, String>,
    errors: HashMap<String, String>,
    phase: SessionPhase,
    seen_refresh: u64,
}

impl FormSession {
    pub fn new(database: Arc<FormDatabase>) -> Self {
        Self {
            database,
            fields: Vec::new(),
            values: HashMap::new(),
            errors: HashMap::new(),
            phase: SessionPhase::Loading,
            seen_refresh: 0,
        }
    }

    /// Fetch the active configuration and seed an empty value for every
    /// field name, disabled fields included. An absent configuration
    /// renders an empty field set rather than failing.
    pub fn load(&mut self) -> Result<(), String> {
        self.phase = SessionPhase::Loading;

        let config = self.database.get_active_configuration().map_err(|e| {
            error!("Error loading configuration: {}", e);
            e
        })?;

        self.fields = config.map(|c| c.fields).unwrap_or_default();
        self.values = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), String::new()))
            .collect();
        self.errors.clear();
        self.phase = SessionPhase::Ready;

        Ok(())
    }

    /// Reload the configuration when the coordinator has advanced past
    /// the value this session last saw. Returns whether a reload ran.
    pub fn observe_refresh(&mut self, coordinator: &RefreshCoordinator) -> Result<bool, String> {
        let current = coordinator.current();
        if current == self.seen_refresh {
            return Ok(false);
        }
        self.seen_refresh = current;
        self.load()?;
        Ok(true)
    }

    /// Record a typed value. Editing a field clears its validation error
    /// immediately, without waiting for a full re-validation.
    pub fn set_value(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value.to_string();
            self.errors.remove(name);
        }
    }

    /// Required-and-enabled fields with a blank (or whitespace-only)
    /// value fail validation; disabled fields never contribute errors.
    pub fn validate(&mut self) -> bool {
        self.errors = validate_required(&self.fields, &self.values);
        self.errors.is_empty()
    }

    /// Submit the current values. Validation failure keeps the errors in
    /// place and issues no insert; gateway failure leaves every value
    /// intact so nothing typed is lost.
    pub fn submit(&mut self) -> Result<Option<FormSubmission>, String> {
        if !self.validate() {
            return Ok(None);
        }

        self.phase = SessionPhase::Submitting;

        match self.database.insert_submission(&self.draft()) {
            Ok(created) => {
                info!("Form submitted as {}", created.id);
                for value in self.values.values_mut() {
                    value.clear();
                }
                self.errors.clear();
                self.phase = SessionPhase::SuccessBanner;
                Ok(Some(created))
            }
            Err(e) => {
                error!("Error submitting form: {}", e);
                self.phase = SessionPhase::Ready;
                Err(e)
            }
        }
    }

    /// Host acknowledges the success banner after showing it.
    pub fn dismiss_banner(&mut self) {
        if self.phase == SessionPhase::SuccessBanner {
            self.phase = SessionPhase::Ready;
        }
    }

    // Every field's current value contributes to the insert, disabled
    // fields included; values without a fixed column travel in `extra`
    // and are dropped by the gateway.
    fn draft(&self) -> NewSubmission {
        let value = |name: &str| self.values.get(name).cloned().unwrap_or_default();

        let extra = self
            .values
            .iter()
            .filter(|(name, _)| !FIXED_COLUMNS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        NewSubmission {
            instagram: value("instagram"),
            recipient_name: value("recipient_name"),
            desired_date: value("desired_date"),
            desired_time: value("desired_time"),
            address: value("address"),
            additional_notes: value("additional_notes"),
            coupon_code: None,
            extra,
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }
}

/// Collect one error per required-and-enabled field whose trimmed value
/// is empty, keyed by field name. Field types are not validated.
pub fn validate_required(
    fields: &[FieldDefinition],
    values: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut errors = HashMap::new();

    for field in fields {
        if field.required && field.enabled {
            let blank = values
                .get(&field.name)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true);
            if blank {
                errors.insert(field.name.clone(), REQUIRED_FIELD_MESSAGE.to_string());
            }
        }
    }

    errors
}

/// Validate an incoming submission payload against the active field list.
pub fn validate_submission(
    fields: &[FieldDefinition],
    payload: &NewSubmission,
) -> HashMap<String, String> {
    let values = fields
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                payload.value_of(&f.name).unwrap_or_default().to_string(),
            )
        })
        .collect();

    validate_required(fields, &values)
}
