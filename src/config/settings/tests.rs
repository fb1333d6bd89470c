use super::*;
use crate::chunking::SplitterStrategy;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.chunking.strategy, SplitterStrategy::Fixed);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.index.vector_store, VectorStoreKind::Disk);
    assert_eq!(config.responder.top_k, 4);
    assert!(config.responder.allow_empty_context);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.generation_model = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.timeout_seconds = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = invalid_config.chunking.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge { .. })
    ));

    let mut invalid_config = config.clone();
    invalid_config.responder.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.responder.prompt_cost_per_1k = -1.0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidCost(_))
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
fn derived_paths_live_under_base_dir() {
    let config = Config::with_base_dir("/tmp/ask-pdf-test");
    assert_eq!(
        config.config_file_path(),
        PathBuf::from("/tmp/ask-pdf-test/config.toml")
    );
    assert_eq!(config.vector_dir(), PathBuf::from("/tmp/ask-pdf-test/vectors"));
    assert_eq!(
        config.usage_db_path(),
        PathBuf::from("/tmp/ask-pdf-test/usage.db")
    );
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [chunking]
        strategy = "recursive"
        chunk_size = 500

        [index]
        vector_store = "memory"
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.chunking.strategy, SplitterStrategy::Recursive);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.index.vector_store, VectorStoreKind::Memory);
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_embedding_model("new-model".to_string()).is_ok());
    assert!(config.set_generation_model("chat-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_timeout_seconds(30).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_generation_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
    assert!(config.set_timeout_seconds(0).is_err());

    assert_eq!(config.protocol, "https");
    assert_eq!(config.port, 8080);
    assert_eq!(config.batch_size, 128);
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::with_base_dir(temp_dir.path().join("nested"));
    config.chunking.strategy = SplitterStrategy::Recursive;
    config.responder.top_k = 8;
    config.ollama.host = "ollama.internal".to_string();
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 10\nchunk_overlap = 10\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn invalid_config_is_not_saved() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.ollama.batch_size = 0;

    assert!(config.save().is_err());
    assert!(!config.config_file_path().exists());
}
