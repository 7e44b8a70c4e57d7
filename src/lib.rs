//! Canje Form Service
//!
//! Backend for a small single-tenant form builder: an admin defines a
//! dynamic set of form fields, end users fill the generated form, and
//! submissions are browsable, editable and exportable from a history
//! view behind a shared PIN gate.
//!
//! # Modules
//!
//! - `services::database`: persistence gateway over the two collections
//!   (configurations and submissions)
//! - `services::form_session` / `services::editor` / `services::history`:
//!   the state containers driving the rendered form, the admin editor
//!   and the history browser
//! - `services::export`: spreadsheet byte-buffer generation
//! - `auth`: the PIN gate and its flag-store capability
//! - `handlers` / `routes`: the HTTP surface

pub mod auth;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;


// Re-export the main types for ease of use
pub use auth::{AccessGate, FlagStore, InMemoryFlagStore};
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::database::{create_database_service, FormDatabase};
