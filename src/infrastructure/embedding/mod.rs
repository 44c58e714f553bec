//! Embedding generator implementations

mod http_client;
mod openai;
mod pattern;

pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiEmbeddingGenerator;
pub use pattern::{PatternEmbeddingGenerator, PATTERN_DIMENSIONS};

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
