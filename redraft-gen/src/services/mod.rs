//! Business logic services for redraft-gen

pub mod content_fetcher;
pub mod credit_ledger;
pub mod generation_client;
pub mod item_processor;
pub mod prompt_builder;
pub mod recovery;
pub mod result_parser;
pub mod task_orchestrator;

pub use content_fetcher::{ContentFetcher, FetchError, HttpContentFetcher, SourceContent};
pub use credit_ledger::{ConsumeReceipt, CreditLedger, LedgerError, RefundReceipt};
pub use generation_client::{
    ChatMessage, GenerationError, GenerationHandler, SseFrameDecoder, StreamingGenerationClient,
    TextGenerator,
};
pub use item_processor::{ItemOutcome, ItemProcessor};
pub use prompt_builder::{ReferenceError, ReferenceGate};
pub use recovery::{recover_interrupted_tasks, RecoveryReport};
pub use result_parser::{clean_markup, parse_variants, serialize_variants, ParsedVariant};
pub use task_orchestrator::{OrchestratorError, StartAck, SubmissionItem, TaskOrchestrator};
