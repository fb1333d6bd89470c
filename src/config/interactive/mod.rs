
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, OllamaConfig};
use crate::chunking::{ChunkingConfig, SplitterStrategy};
use crate::index::VectorStoreKind;
use crate::responder::ResponderConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Ask PDF Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval").bold().yellow());
    eprintln!();

    configure_chunking(&mut config.chunking)?;
    config.index.vector_store = select_vector_store(config.index.vector_store)?;
    configure_responder(&mut config.responder)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
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
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s, {} attempts",
        style(config.ollama.timeout_seconds).cyan(),
        style(config.ollama.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Strategy: {}", style(config.chunking.strategy).cyan());
    eprintln!(
        "  Size / Overlap: {} / {} characters",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    match config.chunking.strategy {
        SplitterStrategy::Fixed => eprintln!(
            "  Separator: {}",
            style(format!("{:?}", config.chunking.separator)).cyan()
        ),
        SplitterStrategy::Recursive => eprintln!(
            "  Separators: {}",
            style(format!("{:?}", config.chunking.separators)).cyan()
        ),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Vector Store: {}",
        style(config.index.vector_store).cyan()
    );
    eprintln!("  Top K: {}", style(config.responder.top_k).cyan());
    eprintln!(
        "  Allow Empty Context: {}",
        style(config.responder.allow_empty_context).cyan()
    );
    eprintln!(
        "  Cost per 1k tokens: prompt {} / completion {}",
        style(config.responder.prompt_cost_per_1k).cyan(),
        style(config.responder.completion_cost_per_1k).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if !config_dir.join("config.toml").exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        return Ok(Config::with_base_dir(config_dir));
    }

    Config::load(config_dir).map_or_else(
        |e| {
            eprintln!(
                "{}",
                style(format!("Existing configuration is invalid ({e:#}). Using defaults.")).yellow()
            );
            Ok(Config::with_base_dir(config_dir))
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model = prompt_model("Embedding model", &ollama.embedding_model)?;
    let generation_model = prompt_model("Answer generation model", &ollama.generation_model)?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(ollama.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=3600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 3600 seconds")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_generation_model(generation_model)?;
    ollama.set_batch_size(batch_size)?;
    ollama.set_timeout_seconds(timeout_seconds)?;

    Ok(())
}

fn prompt_model(prompt: &str, current: &str) -> Result<String> {
    let model = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(model)
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let strategies = [SplitterStrategy::Fixed, SplitterStrategy::Recursive];
    let default_index = strategies
        .iter()
        .position(|&s| s == chunking.strategy)
        .unwrap_or(0);

    let strategy_index = Select::new()
        .with_prompt("Splitter strategy")
        .default(default_index)
        .items(&strategies)
        .interact()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input >= chunk_size {
                Err(format!("Overlap must be smaller than {}", chunk_size))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let updated = ChunkingConfig {
        strategy: strategies[strategy_index],
        chunk_size,
        chunk_overlap,
        ..chunking.clone()
    };
    updated.validate()?;
    *chunking = updated;

    Ok(())
}

fn select_vector_store(current: VectorStoreKind) -> Result<VectorStoreKind> {
    let stores = [VectorStoreKind::Disk, VectorStoreKind::Memory];
    let default_index = stores.iter().position(|&s| s == current).unwrap_or(0);

    let index = Select::new()
        .with_prompt("Vector store")
        .default(default_index)
        .items(&stores)
        .interact()?;

    Ok(stores[index])
}

fn configure_responder(responder: &mut ResponderConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Passages retrieved per question (top k)")
        .default(responder.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top k must be between 1 and 100")
            }
        })
        .interact_text()?;

    let allow_empty_context = Confirm::new()
        .with_prompt("Ask the model even when no passage was retrieved?")
        .default(responder.allow_empty_context)
        .interact()?;

    let updated = ResponderConfig {
        top_k,
        allow_empty_context,
        ..responder.clone()
    };
    updated.validate()?;
    *responder = updated;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
