use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
    assert_eq!(config.embedding.protocol, "http");
    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.model, "nomic-embed-text:latest");
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.completion.backend, CompletionBackend::Placeholder);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.loader.timeout_seconds, 10);
    assert_eq!(config.loader.urls.len(), DEFAULT_DOC_URLS.len());
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.embedding.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.search.endpoint = "not a url".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));

    let mut invalid_config = config;
    invalid_config.loader.timeout_seconds = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));
}

#[test]
fn chunking_validation() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = config.chunking.chunk_size;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));

    config.chunking.chunk_size = 0;
    config.chunking.chunk_overlap = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_section_defaults() {
    let toml_str = r#"
        [completion]
        model = "Gemini-2.5"

        [chunking]
        chunk_size = 500
    "#;
    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.completion.model, "Gemini-2.5");
    assert_eq!(config.completion.backend, CompletionBackend::Placeholder);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.server.port, 8000);
}

#[test]
fn setter_validation() {
    let mut embedding = EmbeddingConfig::default();

    assert!(embedding.set_protocol("https".to_string()).is_ok());
    assert_eq!(embedding.protocol, "https");
    assert!(embedding.set_protocol("ftp".to_string()).is_err());

    assert!(embedding.set_port(8080).is_ok());
    assert_eq!(embedding.port, 8080);
    assert!(embedding.set_port(0).is_err());

    assert!(embedding.set_model("all-minilm".to_string()).is_ok());
    assert!(embedding.set_model("   ".to_string()).is_err());

    assert!(embedding.set_batch_size(32).is_ok());
    assert!(embedding.set_batch_size(0).is_err());
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.index_path(), temp_dir.path().join("index"));
    assert_eq!(config.embedding, EmbeddingConfig::default());
}

#[test]
fn save_and_load_roundtrip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.embedding.provider = EmbeddingProviderKind::Hashing;
    config.server.port = 9100;

    config.save().expect("should save config");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn configured_key_wins_over_environment() {
    let search = SearchConfig {
        api_key: Some("  configured-key ".to_string()),
        ..SearchConfig::default()
    };
    assert_eq!(search.resolved_api_key().as_deref(), Some("configured-key"));
}
