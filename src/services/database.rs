use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rand::Rng;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::models::form::{
    empty_metadata, FieldDefinition, FieldType, FormConfiguration, FormSubmission, NewSubmission,
    SubmissionUpdate,
};

/// Fixed page size for the history listing.
pub const PAGE_SIZE: usize = 10;

const SUBMISSION_HEADERS: [&str; 10] = [
    "id",
    "instagram",
    "recipient_name",
    "desired_date",
    "desired_time",
    "address",
    "additional_notes",
    "coupon_code",
    "metadata",
    "created_at",
];

/// Persistence gateway for both collections: form submissions live in a
/// CSV file behind a file mutex, configurations in a JSON document.
/// The gateway is the single source of truth; every consumer holds its
/// own in-memory copy and reloads through here.
pub struct FormDatabase {
    csv_path: String,
    config_path: String,
    submissions_mutex: Mutex<()>,
    config_mutex: Mutex<()>,
}

impl FormDatabase {
    pub fn new(csv_path: &str, config_path: &str) -> Self {
        // Create the CSV file if it doesn't exist with proper headers
        if !Path::new(csv_path).exists() {
            info!("Creating new submissions database file at {}", csv_path);

            let file = File::create(csv_path).unwrap_or_else(|e| {
                error!("Failed to create database file: {}", e);
                panic!("Failed to create database file: {}", e)
            });

            let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

            if let Err(e) = writer.write_record(SUBMISSION_HEADERS) {
                error!("Failed to write headers: {}", e);
                panic!("Failed to write headers: {}", e);
            }

            if let Err(e) = writer.flush() {
                error!("Failed to flush headers: {}", e);
                panic!("Failed to flush headers: {}", e);
            }
        }

        // Seed the configuration collection with the default active form,
        // the equivalent of the hosted backend's initial migration.
        if !Path::new(config_path).exists() {
            info!("Seeding configuration store at {}", config_path);

            let seed = vec![default_configuration()];
            let payload = serde_json::to_string_pretty(&seed).unwrap_or_else(|e| {
                error!("Failed to serialize seed configuration: {}", e);
                panic!("Failed to serialize seed configuration: {}", e)
            });

            if let Err(e) = std::fs::write(config_path, payload) {
                error!("Failed to create configuration store: {}", e);
                panic!("Failed to create configuration store: {}", e);
            }
        }

        Self {
            csv_path: csv_path.to_string(),
            config_path: config_path.to_string(),
            submissions_mutex: Mutex::new(()),
            config_mutex: Mutex::new(()),
        }
    }

    /// Fetch the single active configuration, or None when no
    /// configuration is currently active.
    pub fn get_active_configuration(&self) -> Result<Option<FormConfiguration>, String> {
        let _lock = self
            .config_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let configurations = self.read_configurations()?;
        Ok(configurations.into_iter().find(|c| c.is_active))
    }

    /// Replace the entire field list of a configuration and refresh its
    /// `updated_at`. Returns None when the id is unknown.
    pub fn update_configuration(
        &self,
        id: &str,
        fields: Vec<FieldDefinition>,
    ) -> Result<Option<FormConfiguration>, String> {
        let _lock = self
            .config_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let mut configurations = self.read_configurations()?;

        let Some(config) = configurations.iter_mut().find(|c| c.id == id) else {
            warn!("No configuration found with id {}", id);
            return Ok(None);
        };

        config.fields = fields;
        config.updated_at = Utc::now().to_rfc3339();
        let updated = config.clone();

        self.write_configurations(&configurations)?;

        info!(
            "Updated configuration {} with {} fields",
            updated.id,
            updated.fields.len()
        );

        Ok(Some(updated))
    }

    /// Insert a new submission. Identity and creation timestamp are
    /// assigned here and are immutable afterwards; metadata starts empty.
    pub fn insert_submission(&self, payload: &NewSubmission) -> Result<FormSubmission, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let record = FormSubmission {
            id: generate_id(),
            instagram: payload.instagram.clone(),
            recipient_name: payload.recipient_name.clone(),
            desired_date: payload.desired_date.clone(),
            desired_time: payload.desired_time.clone(),
            address: payload.address.clone(),
            additional_notes: payload.additional_notes.clone(),
            coupon_code: payload.coupon_code.clone(),
            metadata: empty_metadata(),
            created_at: Utc::now().to_rfc3339(),
        };

        self.append_submission(&record)?;

        info!("Stored submission {} from {}", record.id, record.instagram);

        Ok(record)
    }

    /// One page of submissions ordered by `created_at` descending, plus
    /// the exact total of matching records. The search term is matched
    /// case-insensitively against instagram, recipient name and address.
    pub fn list_submissions(
        &self,
        page: usize,
        search: &str,
    ) -> Result<(Vec<FormSubmission>, usize), String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let mut matching: Vec<FormSubmission> = self
            .read_submissions()?
            .into_iter()
            .filter(|s| matches_search(s, search))
            .collect();

        sort_descending(&mut matching);

        let total = matching.len();
        let start = (page * PAGE_SIZE).min(total);
        let end = (start + PAGE_SIZE).min(total);

        Ok((matching[start..end].to_vec(), total))
    }

    /// Look up a single submission by id.
    pub fn find_submission(&self, id: &str) -> Result<Option<FormSubmission>, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        Ok(self.read_submissions()?.into_iter().find(|s| s.id == id))
    }

    /// Apply the allow-listed subset of changes to a submission. Fields
    /// outside the subset cannot be expressed in the payload type, so
    /// `id`, `created_at` and `metadata` are untouchable here.
    pub fn update_submission(
        &self,
        id: &str,
        changes: &SubmissionUpdate,
    ) -> Result<Option<FormSubmission>, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let mut submissions = self.read_submissions()?;

        let Some(record) = submissions.iter_mut().find(|s| s.id == id) else {
            warn!("No submission found with id {}", id);
            return Ok(None);
        };

        if let Some(value) = &changes.instagram {
            record.instagram = value.clone();
        }
        if let Some(value) = &changes.recipient_name {
            record.recipient_name = value.clone();
        }
        if let Some(value) = &changes.desired_date {
            record.desired_date = value.clone();
        }
        if let Some(value) = &changes.desired_time {
            record.desired_time = value.clone();
        }
        if let Some(value) = &changes.address {
            record.address = value.clone();
        }
        if let Some(value) = &changes.additional_notes {
            record.additional_notes = value.clone();
        }
        if let Some(value) = &changes.coupon_code {
            record.coupon_code = Some(value.clone());
        }

        let updated = record.clone();
        self.write_submissions(&submissions)?;

        info!("Updated submission {}", updated.id);

        Ok(Some(updated))
    }

    /// Delete a submission and return its full prior snapshot, sufficient
    /// to reconstruct the record through `restore_submission`.
    pub fn delete_submission(&self, id: &str) -> Result<Option<FormSubmission>, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let mut submissions = self.read_submissions()?;

        let Some(position) = submissions.iter().position(|s| s.id == id) else {
            warn!("No submission found with id {}", id);
            return Ok(None);
        };

        let snapshot = submissions.remove(position);
        self.write_submissions(&submissions)?;

        info!("Deleted submission {}", snapshot.id);

        Ok(Some(snapshot))
    }

    /// Re-insert a previously deleted snapshot verbatim, keeping its
    /// original `id` and `created_at`. This is the one deliberate
    /// exception to the generated-identity insert semantics.
    pub fn restore_submission(&self, snapshot: &FormSubmission) -> Result<FormSubmission, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let existing = self.read_submissions()?;
        if existing.iter().any(|s| s.id == snapshot.id) {
            return Err(format!("Submission {} already exists", snapshot.id));
        }

        self.append_submission(snapshot)?;

        info!("Restored submission {}", snapshot.id);

        Ok(snapshot.clone())
    }

    /// All submissions whose `created_at` falls within the inclusive
    /// range `[start 00:00:00.000, end 23:59:59.999]` local time, in
    /// descending order and without pagination.
    pub fn submissions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FormSubmission>, String> {
        let _lock = self
            .submissions_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let start_at = local_day_start(start)?;
        let end_at = local_day_end(end)?;

        let mut matching: Vec<FormSubmission> = self
            .read_submissions()?
            .into_iter()
            .filter(|s| match DateTime::parse_from_rfc3339(&s.created_at) {
                Ok(created) => {
                    let millis = created.timestamp_millis();
                    millis >= start_at.timestamp_millis() && millis <= end_at.timestamp_millis()
                }
                Err(e) => {
                    warn!("Skipping record {} with bad timestamp: {}", s.id, e);
                    false
                }
            })
            .collect();

        sort_descending(&mut matching);

        Ok(matching)
    }

    // Load all submissions; callers must hold the file mutex.
    fn read_submissions(&self) -> Result<Vec<FormSubmission>, String> {
        if !Path::new(&self.csv_path).exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.csv_path)
            .map_err(|e| format!("Failed to open database file: {}", e))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut submissions = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| format!("Failed to read record: {}", e))?;
            submissions.push(string_record_to_submission(&record)?);
        }

        Ok(submissions)
    }

    // Overwrite the whole submissions file; callers must hold the mutex.
    fn write_submissions(&self, submissions: &[FormSubmission]) -> Result<(), String> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)
            .map_err(|e| format!("Failed to open database file for writing: {}", e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .write_record(SUBMISSION_HEADERS)
            .map_err(|e| format!("Failed to write headers: {}", e))?;

        for submission in submissions {
            writer
                .write_record(submission_to_row(submission)?)
                .map_err(|e| format!("Failed to write record: {}", e))?;
        }

        writer
            .flush()
            .map_err(|e| format!("Failed to flush writer: {}", e))
    }

    // Append one record; callers must hold the mutex.
    fn append_submission(&self, submission: &FormSubmission) -> Result<(), String> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| format!("Failed to open database file: {}", e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .write_record(submission_to_row(submission)?)
            .map_err(|e| format!("Failed to write record: {}", e))?;

        writer
            .flush()
            .map_err(|e| format!("Failed to flush writer: {}", e))
    }

    // Load all configurations; callers must hold the config mutex.
    fn read_configurations(&self) -> Result<Vec<FormConfiguration>, String> {
        if !Path::new(&self.config_path).exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.config_path)
            .map_err(|e| format!("Failed to open configuration store: {}", e))?;

        serde_json::from_str(&raw).map_err(|e| format!("Failed to parse configuration store: {}", e))
    }

    // Overwrite the configuration store; callers must hold the mutex.
    fn write_configurations(&self, configurations: &[FormConfiguration]) -> Result<(), String> {
        let payload = serde_json::to_string_pretty(configurations)
            .map_err(|e| format!("Failed to serialize configurations: {}", e))?;

        std::fs::write(&self.config_path, payload)
            .map_err(|e| format!("Failed to write configuration store: {}", e))
    }
}

// Convert a StringRecord to a FormSubmission
fn string_record_to_submission(record: &StringRecord) -> Result<FormSubmission, String> {
    if record.len() < 10 {
        return Err(format!(
            "Invalid record length: {}. Expected at least 10 fields.",
            record.len()
        ));
    }

    let get_field = |idx: usize| record.get(idx).unwrap_or_default().to_string();

    let coupon = get_field(7);
    let metadata_raw = get_field(8);
    let metadata = if metadata_raw.is_empty() {
        empty_metadata()
    } else {
        serde_json::from_str(&metadata_raw).unwrap_or_else(|e| {
            warn!("Bad metadata on record {}: {}", get_field(0), e);
            empty_metadata()
        })
    };

    Ok(FormSubmission {
        id: get_field(0),
        instagram: get_field(1),
        recipient_name: get_field(2),
        desired_date: get_field(3),
        desired_time: get_field(4),
        address: get_field(5),
        additional_notes: get_field(6),
        coupon_code: if coupon.is_empty() { None } else { Some(coupon) },
        metadata,
        created_at: get_field(9),
    })
}

fn submission_to_row(submission: &FormSubmission) -> Result<[String; 10], String> {
    let metadata = serde_json::to_string(&submission.metadata)
        .map_err(|e| format!("Failed to serialize metadata: {}", e))?;

    Ok([
        submission.id.clone(),
        submission.instagram.clone(),
        submission.recipient_name.clone(),
        submission.desired_date.clone(),
        submission.desired_time.clone(),
        submission.address.clone(),
        submission.additional_notes.clone(),
        submission.coupon_code.clone().unwrap_or_default(),
        metadata,
        submission.created_at.clone(),
    ])
}

fn matches_search(submission: &FormSubmission, search: &str) -> bool {
    if search.is_empty() {
        return true;
    }
    let term = search.to_lowercase();
    submission.instagram.to_lowercase().contains(&term)
        || submission.recipient_name.to_lowercase().contains(&term)
        || submission.address.to_lowercase().contains(&term)
}

fn sort_descending(submissions: &mut [FormSubmission]) {
    submissions.sort_by_key(|s| {
        std::cmp::Reverse(
            DateTime::parse_from_rfc3339(&s.created_at)
                .map(|d| d.timestamp_millis())
                .unwrap_or(0),
        )
    });
}

fn local_day_start(day: NaiveDate) -> Result<DateTime<Local>, String> {
    let naive = day
        .and_hms_milli_opt(0, 0, 0, 0)
        .ok_or_else(|| format!("Invalid start of day for {}", day))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("Ambiguous local time for {}", day))
}

fn local_day_end(day: NaiveDate) -> Result<DateTime<Local>, String> {
    let naive = day
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| format!("Invalid end of day for {}", day))?;
    Local
        .from_local_datetime(&naive)
        .latest()
        .ok_or_else(|| format!("Ambiguous local time for {}", day))
}

// Random 32-character hex identity for new submissions
fn generate_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

fn default_configuration() -> FormConfiguration {
    let now = Utc::now().to_rfc3339();
    let field = |name: &str, label: &str, field_type: FieldType, required: bool| FieldDefinition {
        name: name.to_string(),
        label: label.to_string(),
        field_type,
        required,
        enabled: true,
    };

    FormConfiguration {
        id: generate_id(),
        fields: vec![
            field("instagram", "Instagram", FieldType::Text, true),
            field(
                "recipient_name",
                "Nombre del destinatario",
                FieldType::Text,
                true,
            ),
            field("desired_date", "Fecha deseada", FieldType::Date, true),
            field("desired_time", "Hora deseada", FieldType::Time, true),
            field("address", "Dirección", FieldType::Text, true),
            field(
                "additional_notes",
                "Notas adicionales",
                FieldType::Textarea,
                false,
            ),
        ],
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    }
}

// Create a singleton database service
pub fn create_database_service() -> Arc<FormDatabase> {
    let default_csv = "/app/data/submissions.csv";
    let default_config = "/app/data/configurations.json";

    let csv_path = std::env::var("FORM_DATABASE_PATH").unwrap_or_else(|_| default_csv.to_string());
    let config_path =
        std::env::var("FORM_CONFIG_PATH").unwrap_or_else(|_| default_config.to_string());

    for path in [&csv_path, &config_path] {
        if let Some(dir) = std::path::Path::new(path).parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                error!("Failed to create data directory: {}", e);
                panic!("Failed to create data directory: {}", e);
            }
        }
    }

    Arc::new(FormDatabase::new(&csv_path, &config_path))
}
