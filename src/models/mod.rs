pub mod chunk;
pub mod loaders;
pub mod question;
pub mod report;
pub mod schema;

pub use chunk::{
    estimate_tokens, ChunkRef, CompletionRequest, CompletionResult, FailureKind, TextChunk,
};
pub use loaders::{load_all_json_files, load_json_source, RawTextSegment};
pub use question::{
    records_to_documents, CandidateOption, Difficulty, OptionEntry, QuestionCandidate,
    QuestionOption, QuestionRecord, QuestionStats, QuestionType, ValidatedCandidate,
};
pub use report::{BatchReport, ChunkFailure, PipelineStage};
pub use schema::{RecordDefaults, SchemaSpec};
