/// Best-effort repair of near-valid JSON from language models.
pub mod json_repair;
/// Per-run research settings resolution.
pub mod settings;
/// TOML configuration and hot-reload manager.
pub mod toml_config;
