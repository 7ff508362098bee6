pub mod category;
pub mod event;
pub mod receipt;

pub use category::AccountingCategory;
pub use event::BatchEvent;
pub use receipt::{CategoryTotal, ExtractedRecord, ReceiptResult};
