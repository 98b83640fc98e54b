
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{CompletionBackend, Config, ConfigError, EmbeddingConfig, EmbeddingProviderKind};

/// Model names offered by the setup wizard. The placeholder backend only echoes them.
pub const MODEL_CHOICES: [&str; 3] = ["Gemini-2.5", "GPT-4o-mini", "StarCoder2"];

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 CodeXR Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Choose how document chunks are turned into vectors.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Language Model").bold().yellow());
    configure_completion(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Web Search & Speech").bold().yellow());
    config.search.api_key = prompt_optional_key("SerpAPI key", config.search.api_key.as_deref())?;
    config.speech.api_key =
        prompt_optional_key("Whisper API key", config.speech.api_key.as_deref())?;

    config.server.port = Input::new()
        .with_prompt("HTTP server port")
        .default(config.server.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    if config.embedding.provider == EmbeddingProviderKind::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.embedding)? {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before ingesting docs.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!(
        "  Provider: {}",
        style(format!("{:?}", config.embedding.provider)).cyan()
    );
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Size / Overlap: {} / {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Language Model:").bold().yellow());
    eprintln!(
        "  Backend: {}",
        style(format!("{:?}", config.completion.backend)).cyan()
    );
    eprintln!("  Model: {}", style(&config.completion.model).cyan());

    eprintln!();
    eprintln!("{}", style("Services:").bold().yellow());
    eprintln!(
        "  Web search: {}",
        key_status(config.search.resolved_api_key().is_some())
    );
    eprintln!(
        "  Transcription: {}",
        key_status(config.speech.resolved_api_key().is_some())
    );
    eprintln!(
        "  HTTP server: {}",
        style(format!("{}:{}", config.server.bind, config.server.port)).cyan()
    );

    eprintln!();
    eprintln!("Index: {}", style(config.index_path().display()).dim());
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn key_status(configured: bool) -> console::StyledObject<&'static str> {
    if configured {
        style("configured").green()
    } else {
        style("not configured").red()
    }
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        let config = Config::load(config_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Ok(Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        })
    }
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = &["ollama", "hashing (offline)"];
    let default_provider = usize::from(embedding.provider == EmbeddingProviderKind::Hashing);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_provider)
        .items(providers)
        .interact()?;

    if provider_index == 1 {
        embedding.provider = EmbeddingProviderKind::Hashing;
        return Ok(());
    }
    embedding.provider = EmbeddingProviderKind::Ollama;

    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Embedding batch size")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 || *input > 1000 {
                Err("Batch size must be between 1 and 1000")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_completion(config: &mut Config) -> Result<()> {
    let backends = &["placeholder", "ollama"];
    let default_backend = usize::from(config.completion.backend == CompletionBackend::Ollama);

    let backend_index = Select::new()
        .with_prompt("Language model backend")
        .default(default_backend)
        .items(backends)
        .interact()?;

    if backend_index == 1 {
        config.completion.backend = CompletionBackend::Ollama;
        config.completion.model = Input::new()
            .with_prompt("Ollama generation model")
            .default(config.completion.model.clone())
            .interact_text()?;
    } else {
        config.completion.backend = CompletionBackend::Placeholder;
        let default_model = MODEL_CHOICES
            .iter()
            .position(|&m| m == config.completion.model)
            .unwrap_or(1);
        let model_index = Select::new()
            .with_prompt("Model name")
            .default(default_model)
            .items(&MODEL_CHOICES)
            .interact()?;
        config.completion.model = MODEL_CHOICES[model_index].to_string();
    }

    Ok(())
}

fn prompt_optional_key(prompt: &str, current: Option<&str>) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(format!("{prompt} (leave empty to use the environment)"))
        .default(current.unwrap_or_default().to_string())
        .allow_empty(true)
        .interact_text()?;

    Ok(Some(value.trim().to_string()).filter(|v| !v.is_empty()))
}

fn test_ollama_connection(embedding: &EmbeddingConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
