use color_eyre::eyre::eyre;
use color_eyre::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override.
    pub fn generate_default_config(&self) -> Result<String> {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;

        let comments = Self::collect_all_comments();
        Ok(Self::comment_all_fields(toml_str, comments))
    }

    /// Collect all field comments from struct constants into a map
    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();

        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }

        let sections: [(&str, &[(&str, &str)]); 5] = [
            ("file_loading", FILE_LOADING_COMMENTS),
            ("query", QUERY_COMMENTS),
            ("chart", CHART_COMMENTS),
            ("store", STORE_COMMENTS),
            ("logging", LOGGING_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }

        comments
    }

    /// Comment out all fields in TOML and add comments.
    /// Also adds missing Option fields as commented-out example values
    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# tabviz configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                current_section = section.clone();

                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Self::add_missing_option_fields(result, &comments, &seen_fields)
    }

    /// Add missing Option fields that weren't serialized (because they're None)
    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        let mut missing_by_section: IndexMap<&str, Vec<(&str, &str)>> = IndexMap::new();
        for &(field_path, example) in OPTION_EXAMPLES {
            if !seen_fields.contains(field_path) && comments.contains_key(field_path) {
                if let Some((section, _)) = field_path.split_once('.') {
                    missing_by_section
                        .entry(section)
                        .or_default()
                        .push((field_path, example));
                }
            }
        }

        for (section, fields) in &missing_by_section {
            let mut new_content = String::new();
            for (field_path, example) in fields {
                if let Some(comment) = comments.get(*field_path) {
                    for comment_line in comment.lines() {
                        new_content.push_str("# ");
                        new_content.push_str(comment_line);
                        new_content.push('\n');
                    }
                }
                let field_name = field_path.rsplit('.').next().unwrap_or(field_path);
                new_content.push_str(&format!("# {} = {}\n", field_name, example));
                new_content.push('\n');
            }

            let section_header = format!("[{}]", section);
            match result.find(&section_header) {
                Some(section_pos) => {
                    let after_header_start = section_pos + section_header.len();
                    let newline_pos = result[after_header_start..].find('\n').unwrap_or(0);
                    let insert_pos = after_header_start + newline_pos + 1;
                    result.insert_str(insert_pos, &new_content);
                }
                // Sections whose fields are all None may not be serialized at all
                None => {
                    if !result.ends_with("\n\n") {
                        result.push('\n');
                    }
                    if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| s == section) {
                        result.push_str(header.1);
                        result.push('\n');
                    }
                    result.push_str(&format!("# {}\n", section_header));
                    result.push_str(&new_content);
                }
            }
        }

        result
    }

    /// Extract section name from TOML line like "[query]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    /// Extract dotted field path from a `key = value` line
    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }

        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;

        let template = self.generate_default_config()?;
        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub query: QueryConfig,
    pub chart: ChartConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "file_loading",
        "# ============================================================================\n# File Loading Defaults\n# ============================================================================",
    ),
    (
        "query",
        "# ============================================================================\n# Row Queries\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Charts\n# ============================================================================",
    ),
    (
        "store",
        "# ============================================================================\n# Dataset Store\n# ============================================================================",
    ),
    (
        "logging",
        "# ============================================================================\n# Logging\n# ============================================================================",
    ),
];

/// Commented-out values written to the template for Option fields left unset.
/// Each must parse when uncommented.
const OPTION_EXAMPLES: &[(&str, &str)] = &[
    ("file_loading.delimiter", "59"),
    ("file_loading.excel_sheet", "\"Sales\""),
    ("chart.palette", "[\"#3B82F6\", \"#EF4444\", \"#10B981\"]"),
    ("store.data_dir", "\"/var/lib/tabviz/datasets\""),
];

/// Default upload size cap in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
/// Hard ceiling on rows per page.
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoadingConfig {
    /// Delimiter override for delimited text (ASCII value, e.g. 59 for ';').
    pub delimiter: Option<u8>,
    /// Workbook sheet to read: 0-based index or sheet name.
    pub excel_sheet: Option<String>,
    /// Largest accepted upload in megabytes; 0 disables the cap.
    pub max_file_size_mb: u64,
}

const FILE_LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Delimiter override for CSV files (as ASCII value, e.g., 59 for ';')\nIf not specified, ',' is used for .csv and tab for .tsv",
    ),
    (
        "excel_sheet",
        "Excel sheet to load: 0-based index (e.g. \"0\") or sheet name (e.g. \"Sales\")\nIf not specified, the first sheet is used",
    ),
    (
        "max_file_size_mb",
        "Largest accepted upload in megabytes. Set to 0 for no limit.",
    ),
];

impl Default for FileLoadingConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            excel_sheet: None,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

const QUERY_COMMENTS: &[(&str, &str)] = &[
    ("default_limit", "Rows per page when a query does not set a limit"),
    (
        "max_limit",
        "Largest accepted rows-per-page value (1 to 100)",
    ),
];

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChartConfig {
    /// Series colors as #rrggbb, cycled. None uses the built-in 15-color palette.
    pub palette: Option<Vec<String>>,
}

const CHART_COMMENTS: &[(&str, &str)] = &[(
    "palette",
    "Series colors as a list of \"#rrggbb\" strings, cycled when a chart needs more.\nIf not specified, the built-in 15-color palette is used",
)];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for stored datasets. None = platform data dir.
    pub data_dir: Option<String>,
}

const STORE_COMMENTS: &[(&str, &str)] = &[(
    "data_dir",
    "Directory where ingested datasets are stored as JSON.\nIf not specified, the platform data directory is used (e.g. ~/.local/share/tabviz/datasets)",
)];

impl StoreConfig {
    /// Resolve the dataset directory, falling back to the platform data dir.
    pub fn resolve_data_dir(&self, app_name: &str) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| eyre!("Could not determine data directory"))?
                .join(app_name)
                .join("datasets")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

const LOGGING_COMMENTS: &[(&str, &str)] = &[
    (
        "level",
        "Log level filter: error, warn, info, debug or trace (RUST_LOG overrides this)",
    ),
    ("json", "Write logs to stderr as JSON lines instead of text"),
];

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            query: QueryConfig::default(),
            chart: ChartConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load configuration using the given manager's config.toml
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let config_path = manager.config_path("config.toml");
        let mut config = AppConfig::default();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                eyre!(
                    "Failed to read config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            let user_config: AppConfig = toml::from_str(&content).map_err(|e| {
                eyre!(
                    "Failed to parse config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            config.merge(user_config);
        }

        config.validate().map_err(|e| {
            eyre!("Invalid configuration in {}: {}", config_path.display(), e)
        })?;

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.file_loading.merge(other.file_loading);
        self.query.merge(other.query);
        self.chart.merge(other.chart);
        self.store.merge(other.store);
        self.logging.merge(other.logging);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.query.max_limit == 0 || self.query.max_limit > MAX_PAGE_LIMIT {
            return Err(eyre!(
                "query.max_limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT,
                self.query.max_limit
            ));
        }

        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(eyre!(
                "query.default_limit must be between 1 and query.max_limit ({}), got {}",
                self.query.max_limit,
                self.query.default_limit
            ));
        }

        if let Some(palette) = &self.chart.palette {
            if palette.is_empty() {
                return Err(eyre!("chart.palette must contain at least one color when set"));
            }
            for color in palette {
                parse_hex(color)?;
            }
        }

        Ok(())
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.excel_sheet.is_some() {
            self.excel_sheet = other.excel_sheet;
        }
        if other.max_file_size_mb != FileLoadingConfig::default().max_file_size_mb {
            self.max_file_size_mb = other.max_file_size_mb;
        }
    }

    /// Upload size cap in bytes, if any.
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        match self.max_file_size_mb {
            0 => None,
            mb => Some(mb.saturating_mul(1024 * 1024)),
        }
    }
}

impl QueryConfig {
    pub fn merge(&mut self, other: Self) {
        let default = QueryConfig::default();
        if other.default_limit != default.default_limit {
            self.default_limit = other.default_limit;
        }
        if other.max_limit != default.max_limit {
            self.max_limit = other.max_limit;
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        if other.palette.is_some() {
            self.palette = other.palette;
        }
    }
}

impl StoreConfig {
    pub fn merge(&mut self, other: Self) {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = LoggingConfig::default();
        if other.level != default.level {
            self.level = other.level;
        }
        if other.json != default.json {
            self.json = other.json;
        }
    }
}

/// Parse hex color string (#ff0000) to RGB components
pub fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    if !s.starts_with('#') || s.len() != 7 || !s.is_ascii() {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }

    let r = u8::from_str_radix(&s[1..3], 16)
        .map_err(|_| eyre!("Invalid red component in hex color: {}", s))?;
    let g = u8::from_str_radix(&s[3..5], 16)
        .map_err(|_| eyre!("Invalid green component in hex color: {}", s))?;
    let b = u8::from_str_radix(&s[5..7], 16)
        .map_err(|_| eyre!("Invalid blue component in hex color: {}", s))?;

    Ok((r, g, b))
}
