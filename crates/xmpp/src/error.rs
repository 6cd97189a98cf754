use thiserror::Error;

use crate::pipeline::StanzaClass;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stanza parse failed: {0}")]
    ParseFailed(String),

    #[error("processor failed: {0}")]
    ProcessorFailed(String),

    #[error("an interceptor is already registered for {0}")]
    AlreadyRegistered(StanzaClass),
}
