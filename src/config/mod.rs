//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheBackend, CacheConfig, EmbeddingServiceConfig, LogFormat, LoggingConfig,
    OpenAiEmbeddingConfig, ServerConfig, StoreBackend, StoreConfig,
};
