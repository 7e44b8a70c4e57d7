pub mod database;
pub mod editor;
pub mod export;
pub mod form_session;
pub mod history;
pub mod refresh;

#[cfg(test)]
mod export_test;
