use crate::config::layers::ConfigLayer;
use crate::config::types::Config;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a configuration file into an override layer
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(ConfigLayer)` - Successfully parsed layer
/// * `Err(ConfigError)` - Failed to read or parse the file
pub fn load_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    ConfigLayer::from_toml(&content)
}

/// Loads, merges and validates configuration files
///
/// Later files override earlier ones.
///
/// # Arguments
///
/// * `paths` - Paths to the TOML configuration files, lowest precedence first
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use sumi_swell::config::load_config;
///
/// let config = load_config(&[PathBuf::from("swell.toml")]).unwrap();
/// println!("Base URL: {}", config.site.base_url);
/// ```
pub fn load_config<P: AsRef<Path>>(paths: &[P]) -> Result<Config, ConfigError> {
    let layers = load_layers(paths)?;
    Config::from_layers(&layers)
}

/// Reads every file into a layer, in order
pub fn load_layers<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ConfigLayer>, ConfigError> {
    paths.iter().map(|path| load_layer(path.as_ref())).collect()
}

/// Computes a SHA-256 hash over the content of the configuration files
///
/// This is recorded in the manifest metadata so a published manifest can be
/// traced back to the configuration that produced it.
///
/// # Arguments
///
/// * `paths` - Paths to the TOML configuration files, in load order
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the concatenated contents
/// * `Err(ConfigError)` - Failed to read a file
pub fn compute_config_hash<P: AsRef<Path>>(paths: &[P]) -> Result<String, ConfigError> {
    let mut hasher = Sha256::new();
    for path in paths {
        let content = std::fs::read(path.as_ref())?;
        hasher.update(&content);
        // Separator so ["ab", "c"] and ["a", "bc"] hash differently
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash<P: AsRef<Path>>(paths: &[P]) -> Result<(Config, String), ConfigError> {
    let config = load_config(paths)?;
    let hash = compute_config_hash(paths)?;
    Ok((config, hash))
}
