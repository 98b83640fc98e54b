// Configuration management module
// TOML settings plus the interactive setup wizard

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CompletionBackend, CompletionConfig, Config, ConfigError, EmbeddingConfig,
    EmbeddingProviderKind, LoaderConfig, RetrievalConfig, SearchConfig, ServerConfig,
    SpeechConfig,
};
