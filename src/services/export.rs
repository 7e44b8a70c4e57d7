use chrono::{DateTime, Local, NaiveDate};
use csv::WriterBuilder;

use crate::models::form::FormSubmission;

/// Fixed, human-readable header row for every export.
pub const EXPORT_HEADERS: [&str; 8] = [
    "Instagram",
    "Destinatario",
    "Fecha deseada",
    "Hora deseada",
    "Dirección",
    "Cupón",
    "Notas adicionales",
    "Creado el",
];

/// A generated download: filename plus the workbook byte buffer.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One submission as a single-row workbook, named from the Instagram
/// handle and a short id prefix.
pub fn single_export(submission: &FormSubmission) -> Result<ExportFile, String> {
    let handle = if submission.instagram.is_empty() {
        "sin-instagram"
    } else {
        submission.instagram.as_str()
    };
    let id_prefix: String = submission.id.chars().take(8).collect();

    Ok(ExportFile {
        filename: format!("registro-{}-{}.csv", handle, id_prefix),
        bytes: workbook(std::slice::from_ref(submission))?,
    })
}

/// A date-range worth of submissions, one row per record, named from the
/// two formatted dates. Callers validate the range and reject empty
/// result sets before coming here.
pub fn range_export(
    submissions: &[FormSubmission],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ExportFile, String> {
    Ok(ExportFile {
        filename: format!(
            "registros-{}-{}.csv",
            start.format("%d-%m-%Y"),
            end.format("%d-%m-%Y")
        ),
        bytes: workbook(submissions)?,
    })
}

// Header row plus one data row per submission, into an in-memory buffer.
fn workbook(submissions: &[FormSubmission]) -> Result<Vec<u8>, String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    writer
        .write_record(EXPORT_HEADERS)
        .map_err(|e| format!("Failed to write export headers: {}", e))?;

    for submission in submissions {
        writer
            .write_record(submission_row(submission))
            .map_err(|e| format!("Failed to write export row: {}", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| format!("Failed to finish export buffer: {}", e))
}

fn submission_row(submission: &FormSubmission) -> [String; 8] {
    [
        submission.instagram.clone(),
        submission.recipient_name.clone(),
        submission.desired_date.clone(),
        submission.desired_time.clone(),
        submission.address.clone(),
        submission.coupon_code.clone().unwrap_or_default(),
        submission.additional_notes.clone(),
        format_created_at(&submission.created_at),
    ]
}

/// Render a stored timestamp for display, local time, day first.
pub fn format_created_at(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| {
            d.with_timezone(&Local)
                .format("%d/%m/%Y %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}
