pub mod error;
pub mod filter;
pub mod pipeline;
pub mod processors;
pub mod stanza;

pub use error::PipelineError;
pub use filter::{FilterOutcome, RosterGroupFilter};
pub use pipeline::{
    InterceptorRegistry, ProcessorContext, ProcessorResult, StanzaClass, StanzaPipeline,
    StanzaProcessor,
};
pub use processors::IgnoreGroupsProcessor;
pub use stanza::Stanza;
