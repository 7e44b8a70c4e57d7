pub mod common;
pub mod form;
