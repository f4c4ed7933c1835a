pub mod assembler;
pub mod extraction_client;
pub mod prompt_builder;
pub mod response_parser;
pub mod validator;

pub use assembler::{
    content_fingerprint, DocumentAssembler, IdGenerator, SequentialIdGenerator, UuidGenerator,
};
pub use extraction_client::{
    BackendError, BackendErrorKind, CompletionBackend, ExtractionClient, OpenAiBackend,
    RetryPolicy,
};
pub use prompt_builder::PromptBuilder;
pub use response_parser::{parse_completion, ParseFailure};
pub use validator::{RejectReason, Validator};
