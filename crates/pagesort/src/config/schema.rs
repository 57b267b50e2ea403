use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extractor: ExtractorConfig::default(),
            classifier: ClassifierConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings for page image extraction through ImageMagick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_density")]
    pub density: u32,
    #[serde(default = "default_resize")]
    pub resize: String,
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Fixed batch size. When unset it follows the CPU count, clamped to
    /// `min_batch_size..=max_batch_size`.
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,
}

fn default_binary() -> String {
    "magick".to_string()
}

fn default_density() -> u32 {
    150
}

fn default_resize() -> String {
    "1500x1500".to_string()
}

fn default_min_batch_size() -> usize {
    5
}

fn default_max_batch_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_extract_timeout() -> u64 {
    60
}

impl ExtractorConfig {
    pub fn effective_batch_size(&self) -> usize {
        match self.batch_size {
            Some(size) => size.max(1),
            None => num_cpus::get().clamp(self.min_batch_size, self.max_batch_size),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            density: default_density(),
            resize: default_resize(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
            batch_size: None,
            max_retries: default_max_retries(),
            timeout_secs: default_extract_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_classify_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_classify_timeout() -> u64 {
    120
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_classify_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory under the data directory that receives split documents.
    #[serde(default = "default_done_directory")]
    pub done_directory: String,
}

fn default_done_directory() -> String {
    "done".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            done_directory: default_done_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
