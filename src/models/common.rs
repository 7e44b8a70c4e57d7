use serde::{Deserialize, Serialize};

use crate::models::form::FormSubmission;

// History listing query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub search: String,
}

// One page of submissions plus the exact total
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionPage {
    pub total_count: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub submissions: Vec<FormSubmission>,
}

// Inclusive date range, both bounds required by the export flow
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PinRequest {
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}
