pub mod backend;
pub mod batch;
pub mod classify;
pub mod extract;
pub mod normalize;
pub mod pdf;
pub mod prompts;
pub mod statement;

pub use backend::{ClaudeBackend, InferenceBackend, InferenceError, MockBackend};
pub use batch::{PipelineError, ReceiptPipeline};
pub use classify::{classify_category, DocKind};
pub use extract::{extract_record, process_receipt, ExtractError};
pub use normalize::{prepare_images, ImagePayload, NormalizeError};
pub use pdf::{MockPdfRenderer, PdfError, PdfRenderer, UnsupportedPdfRenderer};
pub use statement::{MockStatementExtractor, StatementExtractor, UnsupportedStatements};
