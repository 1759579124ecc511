use serde::Deserialize;

/// Main configuration structure for Linguamap
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// The URL the crawl starts from; its host bounds the whole crawl
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum page body size in bytes; larger pages are rejected
    #[serde(rename = "max-page-bytes", default = "default_max_page_bytes")]
    pub max_page_bytes: u64,

    /// File extensions that are never fetched
    #[serde(
        rename = "disallowed-extensions",
        default = "default_disallowed_extensions"
    )]
    pub disallowed_extensions: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages to fetch in one run
    #[serde(rename = "max-pages")]
    pub max_pages: u64,

    /// Number of fetched pages grouped into one analysis batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Maximum fetch retries before a URL is abandoned
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Politeness delay between fetches when the server is healthy (ms)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Lower clamp for the politeness delay (ms)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper clamp for the politeness delay (ms)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Number of recent requests considered by the rate controller
    #[serde(rename = "error-window", default = "default_error_window")]
    pub error_window: usize,

    /// Windowed error rate above which the delay is increased
    #[serde(rename = "error-threshold", default = "default_error_threshold")]
    pub error_threshold: f64,

    /// First retry backoff delay (ms); doubles per attempt
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Cap on the exponential retry backoff (ms)
    #[serde(rename = "backoff-cap-ms", default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Content-analysis service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Chat-completions endpoint of the analysis service
    pub endpoint: String,

    /// Model identifier passed with each request
    pub model: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum concurrent analysis calls within one batch
    #[serde(default = "default_analysis_concurrency")]
    pub concurrency: usize,

    /// Per-page analysis retries before the unanalyzed sentinel is used
    #[serde(rename = "max-retries", default = "default_analysis_retries")]
    pub max_retries: u32,

    /// Delay before the first analysis retry (ms); doubles per attempt
    #[serde(rename = "retry-delay-ms", default = "default_analysis_retry_delay")]
    pub retry_delay_ms: u64,

    /// Whether output assembly translates pages into their group language
    #[serde(default)]
    pub translate: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving the per-language consolidated documents
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Path to the JSON run summary
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

fn default_max_page_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_disallowed_extensions() -> Vec<String> {
    [
        "pdf", "zip", "tar", "gz", "rar", "7z", "exe", "dmg", "iso", "jpg", "jpeg", "png", "gif",
        "svg", "webp", "ico", "mp3", "mp4", "avi", "mov", "wmv", "doc", "docx", "xls", "xlsx",
        "ppt", "pptx", "css", "js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_error_window() -> usize {
    10
}

fn default_error_threshold() -> f64 {
    0.3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    8000
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_analysis_concurrency() -> usize {
    4
}

fn default_analysis_retries() -> u32 {
    2
}

fn default_analysis_retry_delay() -> u64 {
    500
}
