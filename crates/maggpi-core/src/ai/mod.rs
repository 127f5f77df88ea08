pub mod json;
mod prompts;
pub mod providers;
mod summarizer;

pub use providers::{
    AiProvider, DiscoveredSource, DiscoveryRequest, GeminiApiProvider, SummarizedStory,
    SummaryRequest,
};
pub use summarizer::{provider_factory, ProviderFactory, Summarizer};
