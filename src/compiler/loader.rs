use anyhow::{Result, Context as AnyhowContext};
use std::fs;
use std::path::Path;
use crate::config::ComposerConfig;
use crate::dsl::{ExtensionData, PromptDocument};

pub fn load_prompt_from_yaml(file_path: impl AsRef<Path>) -> Result<PromptDocument> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    let document: PromptDocument = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize prompt document from {}", file_path.display()))?;

    Ok(document)
}

pub fn load_extension_from_yaml(file_path: impl AsRef<Path>) -> Result<ExtensionData> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize extension from {}", file_path.display()))
}

/// Missing fields fall back to [`ComposerConfig::default`].
pub fn load_config_from_yaml(file_path: impl AsRef<Path>) -> Result<ComposerConfig> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read config file from {}", file_path.display()))?;

    serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize config from {}", file_path.display()))
}
