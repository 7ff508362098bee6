pub mod csv_export;

pub use csv_export::{summarize, write_csv, ExportError};
