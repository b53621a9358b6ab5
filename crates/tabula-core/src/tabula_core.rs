//! Tabula Core - column model and value coercion for the table editor
//!
//! This crate holds the types every other tabula crate shares:
//!
//! - `ColumnDefinition` / `ColumnType` - the closed set of column types
//! - `TableRow` / `TempRow` - server rows and rows staged for creation
//! - `value_coder` - conversion between display, edit-buffer and submission
//!   representations of a cell value
//!
//! Cell values are plain `serde_json::Value`s since that is what the
//! backend speaks.

mod error;
mod types;
pub mod value_coder;

pub use error::*;
pub use types::*;
pub use value_coder::{
    coerce_for_submission, coerce_patch, coerce_row, format_for_display, format_for_input,
    is_field_empty, NULL_DISPLAY,
};
