//! Layered configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `~/.config/scout/config.toml`, or the file given with `--config`
//! 3. `SCOUT_*` environment variables (`__` separates sections, e.g. `SCOUT_LLM__MODEL`)
//! 4. Well-known credential variables (`OPENAI_API_KEY`, `TAVILY_API_KEY`, ...)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use scout_research::{EnrichmentStrategy, DEFAULT_RESULT_SELECTOR};
use scout_tools::BROWSER_USER_AGENT;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Credential variables and the config keys they land on.
const CREDENTIAL_VARS: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "credentials.openai_api_key"),
    ("AZURE_OPENAI_API_KEY", "credentials.azure_openai_api_key"),
    ("AZURE_OPENAI_ENDPOINT", "credentials.azure_openai_endpoint"),
    ("OPENAI_API_VERSION", "credentials.openai_api_version"),
    ("GROQ_API_KEY", "credentials.groq_api_key"),
    ("TAVILY_API_KEY", "search.tavily_api_key"),
    ("SERPAPI_API_KEY", "search.serpapi_api_key"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Filled from the environment, never written by `scout setup`.
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Azure,
    Openai,
    Groq,
    /// Any OpenAI-compatible server; needs `base_url`.
    Compatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name (defaults per provider)
    #[serde(default)]
    pub model: Option<String>,

    /// Azure deployment name (defaults to the model name)
    #[serde(default)]
    pub deployment: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// API base URL, or the resource endpoint for Azure
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Azure API version
    #[serde(default)]
    pub api_version: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            deployment: None,
            temperature: default_temperature(),
            base_url: None,
            api_key: None,
            api_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub tavily_api_key: Option<String>,

    #[serde(default)]
    pub serpapi_api_key: Option<String>,

    #[serde(default)]
    pub strategy: EnrichmentStrategy,

    /// Agent loop limit for enrichment
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_true")]
    pub enable_duckduckgo: bool,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> usize {
    8
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            serpapi_api_key: None,
            strategy: EnrichmentStrategy::default(),
            max_iterations: default_max_iterations(),
            enable_duckduckgo: true,
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverStrategy {
    /// Scrape the Google results page
    #[default]
    Scrape,
    /// Ask SerpAPI (needs SERPAPI_API_KEY)
    Serpapi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub strategy: ResolverStrategy,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// CSS selector of one organic result on the results page
    #[serde(default = "default_result_selector")]
    pub result_selector: String,

    /// Request timeout (client default when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

fn default_result_selector() -> String {
    DEFAULT_RESULT_SELECTOR.to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ResolverStrategy::default(),
            user_agent: default_user_agent(),
            result_selector: default_result_selector(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    10
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Custom report prompt template file (supports $HOME, ~)
    #[serde(default)]
    pub template: Option<String>,

    /// Word template used for exports (supports $HOME, ~)
    #[serde(default = "default_docx_template")]
    pub docx_template: String,

    /// Directory exports are written to (current directory when unset)
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_docx_template() -> String {
    "ModelTemplate.docx".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template: None,
            docx_template: default_docx_template(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the session database (supports $HOME, ~)
    #[serde(default)]
    pub db_path: Option<String>,

    /// Keep reports and history across runs
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_path: None, // Will default to ~/.config/scout/sessions.db
            persist: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub azure_openai_api_key: Option<String>,
    #[serde(default)]
    pub azure_openai_endpoint: Option<String>,
    #[serde(default)]
    pub openai_api_version: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
}

/// Everything needed to construct the language-model provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLlm {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

impl LlmConfig {
    /// Model name, falling back to the provider's default.
    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider {
            ProviderKind::Groq => DEFAULT_GROQ_MODEL.to_string(),
            _ => DEFAULT_MODEL.to_string(),
        })
    }

    /// Merge explicit settings with environment credentials. Explicit
    /// settings win.
    pub fn resolve(&self, credentials: &Credentials) -> Result<ResolvedLlm> {
        let model = self.model_name();
        let explicit_key = self.api_key.clone();

        let resolved = match self.provider {
            ProviderKind::Azure => {
                let endpoint = self
                    .base_url
                    .clone()
                    .or_else(|| credentials.azure_openai_endpoint.clone())
                    .context("Azure OpenAI needs an endpoint: set AZURE_OPENAI_ENDPOINT or [llm].base_url")?;
                let api_key = explicit_key
                    .or_else(|| credentials.azure_openai_api_key.clone())
                    .or_else(|| credentials.openai_api_key.clone())
                    .context(
                        "Azure OpenAI needs an API key: set AZURE_OPENAI_API_KEY, OPENAI_API_KEY or [llm].api_key",
                    )?;
                ResolvedLlm {
                    provider: self.provider,
                    deployment: Some(self.deployment.clone().unwrap_or_else(|| model.clone())),
                    api_version: Some(
                        self.api_version
                            .clone()
                            .or_else(|| credentials.openai_api_version.clone())
                            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                    ),
                    model,
                    api_key,
                    base_url: Some(endpoint),
                }
            }
            ProviderKind::Openai => ResolvedLlm {
                provider: self.provider,
                api_key: explicit_key
                    .or_else(|| credentials.openai_api_key.clone())
                    .context("OpenAI needs an API key: set OPENAI_API_KEY or [llm].api_key")?,
                model,
                base_url: self.base_url.clone(),
                deployment: None,
                api_version: None,
            },
            ProviderKind::Groq => ResolvedLlm {
                provider: self.provider,
                api_key: explicit_key
                    .or_else(|| credentials.groq_api_key.clone())
                    .context("Groq needs an API key: set GROQ_API_KEY or [llm].api_key")?,
                model,
                base_url: self.base_url.clone(),
                deployment: None,
                api_version: None,
            },
            ProviderKind::Compatible => ResolvedLlm {
                provider: self.provider,
                base_url: Some(
                    self.base_url
                        .clone()
                        .context("A compatible provider needs [llm].base_url")?,
                ),
                // Local servers commonly accept any key
                api_key: explicit_key.unwrap_or_default(),
                model,
                deployment: None,
                api_version: None,
            },
        };

        Ok(resolved)
    }
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    // Expand ~ at the start
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    // Expand $VAR and ${VAR}
    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return PathBuf::from(result);
    };
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

impl Config {
    /// Load from every source. An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        Self::figment(path)
            .extract()
            .context("Invalid configuration")
    }

    /// The provider chain. `path` replaces the user config file.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| Self::config_path().ok());
        if let Some(file) = file.filter(|f| f.exists()) {
            figment = figment.merge(Toml::file(file));
        }

        figment
            .merge(Env::prefixed("SCOUT_").split("__"))
            .merge(credential_env())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("scout"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Session database: config > ~/.config/scout/sessions.db
    pub fn session_db_path(&self) -> Result<PathBuf> {
        match &self.session.db_path {
            Some(path) => Ok(expand_path(path)),
            None => Ok(Self::config_dir()?.join("sessions.db")),
        }
    }

    /// Where an export for `file_name` goes: output_dir (or the current
    /// directory) joined with the name.
    pub fn export_path(&self, file_name: &str) -> PathBuf {
        let dir = self
            .report
            .output_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from("."));
        dir.join(file_name)
    }

    /// Copy safe to print: every secret replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        redact(&mut config.llm.api_key);
        redact(&mut config.search.tavily_api_key);
        redact(&mut config.search.serpapi_api_key);
        redact(&mut config.credentials.openai_api_key);
        redact(&mut config.credentials.azure_openai_api_key);
        redact(&mut config.credentials.groq_api_key);
        config
    }
}

fn redact(secret: &mut Option<String>) {
    if secret.is_some() {
        *secret = Some("<redacted>".to_string());
    }
}

/// Raw credential variables mapped onto their config keys.
fn credential_env() -> Env {
    let vars: Vec<&str> = CREDENTIAL_VARS.iter().map(|(var, _)| *var).collect();

    Env::raw().only(&vars).map(|key| {
        CREDENTIAL_VARS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, target)| (*target).into())
            .unwrap_or_else(|| key.as_str().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::Azure);
        assert_eq!(config.llm.model_name(), "gpt-4o");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.search.strategy, EnrichmentStrategy::Agent);
        assert_eq!(config.resolver.strategy, ResolverStrategy::Scrape);
        assert_eq!(config.resolver.user_agent, "Mozilla/5.0");
        assert_eq!(config.resolver.result_selector, "div.tF2Cxc");
        assert_eq!(config.extractor.fetch_timeout_secs, 10);
        assert_eq!(config.report.docx_template, "ModelTemplate.docx");
        assert!(config.session.persist);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [llm]
            provider = "groq"

            [search]
            strategy = "fallback"
            max_iterations = 4

            [resolver]
            strategy = "serpapi"
            timeout_secs = 15

            [report]
            output_dir = "/tmp/reports"
        "#;

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.llm.provider, ProviderKind::Groq);
        assert_eq!(config.llm.model_name(), DEFAULT_GROQ_MODEL);
        assert_eq!(config.search.strategy, EnrichmentStrategy::Fallback);
        assert_eq!(config.search.max_iterations, 4);
        assert!(config.search.enable_duckduckgo);
        assert_eq!(config.resolver.strategy, ResolverStrategy::Serpapi);
        assert_eq!(config.resolver.timeout_secs, Some(15));
        assert_eq!(config.resolver.user_agent, "Mozilla/5.0");
        assert_eq!(
            config.export_path("Acme Corp_Report.docx"),
            PathBuf::from("/tmp/reports/Acme Corp_Report.docx")
        );
    }

    #[test]
    fn test_layering_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "scout.toml",
                r#"
                    [llm]
                    provider = "openai"
                    model = "gpt-4o"

                    [search]
                    tavily_api_key = "tvly-from-file"
                "#,
            )?;
            jail.set_env("SCOUT_LLM__MODEL", "gpt-4o-mini");
            jail.set_env("SCOUT_SEARCH__STRATEGY", "off");
            jail.set_env("TAVILY_API_KEY", "tvly-from-env");
            jail.set_env("OPENAI_API_KEY", "sk-from-env");

            let config: Config = Config::figment(Some(Path::new("scout.toml"))).extract()?;

            assert_eq!(config.llm.provider, ProviderKind::Openai);
            assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
            assert_eq!(config.search.strategy, EnrichmentStrategy::Off);
            assert_eq!(config.search.tavily_api_key.as_deref(), Some("tvly-from-env"));
            assert_eq!(
                config.credentials.openai_api_key.as_deref(),
                Some("sk-from-env")
            );
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_explicit_file() {
        assert!(Config::load(Some(Path::new("/nonexistent/scout.toml"))).is_err());
    }

    #[test]
    fn test_resolve_azure() {
        let credentials = Credentials {
            azure_openai_api_key: Some("azure-key".to_string()),
            azure_openai_endpoint: Some("https://acme.openai.azure.com".to_string()),
            ..Default::default()
        };

        let resolved = LlmConfig::default().resolve(&credentials).unwrap();
        assert_eq!(resolved.api_key, "azure-key");
        assert_eq!(resolved.base_url.as_deref(), Some("https://acme.openai.azure.com"));
        assert_eq!(resolved.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(resolved.api_version.as_deref(), Some(DEFAULT_AZURE_API_VERSION));
    }

    #[test]
    fn test_resolve_azure_with_openai_key() {
        let credentials = Credentials {
            openai_api_key: Some("sk-shared".to_string()),
            azure_openai_endpoint: Some("https://acme.openai.azure.com".to_string()),
            openai_api_version: Some("2024-06-01".to_string()),
            ..Default::default()
        };

        let resolved = LlmConfig::default().resolve(&credentials).unwrap();
        assert_eq!(resolved.provider, ProviderKind::Azure);
        assert_eq!(resolved.api_key, "sk-shared");
        assert_eq!(resolved.api_version.as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_azure_key_preferred_over_openai_key() {
        let credentials = Credentials {
            openai_api_key: Some("sk-shared".to_string()),
            azure_openai_api_key: Some("azure-key".to_string()),
            azure_openai_endpoint: Some("https://acme.openai.azure.com".to_string()),
            ..Default::default()
        };
        assert_eq!(LlmConfig::default().resolve(&credentials).unwrap().api_key, "azure-key");
    }

    #[test]
    fn test_resolve_explicit_key_wins() {
        let llm = LlmConfig {
            provider: ProviderKind::Openai,
            api_key: Some("sk-explicit".to_string()),
            ..Default::default()
        };
        let credentials = Credentials {
            openai_api_key: Some("sk-env".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.resolve(&credentials).unwrap().api_key, "sk-explicit");
    }

    #[test]
    fn test_resolve_missing_credentials() {
        let err = LlmConfig::default()
            .resolve(&Credentials::default())
            .unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));

        let groq = LlmConfig {
            provider: ProviderKind::Groq,
            ..Default::default()
        };
        assert!(groq.resolve(&Credentials::default()).is_err());

        let compatible = LlmConfig {
            provider: ProviderKind::Compatible,
            base_url: Some("http://localhost:11434/v1".to_string()),
            ..Default::default()
        };
        assert_eq!(compatible.resolve(&Credentials::default()).unwrap().api_key, "");
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        config.search.tavily_api_key = Some("tvly-secret".to_string());
        config.credentials.groq_api_key = Some("gsk-secret".to_string());

        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
        assert_eq!(config.redacted().search.serpapi_api_key, None);
    }

    #[test]
    fn test_expand_path() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~/reports"), home.join("reports"));
        assert_eq!(expand_path("/var/data"), PathBuf::from("/var/data"));
    }
}
