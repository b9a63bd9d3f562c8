//! Gateway configuration.
//!
//! Two layers exist:
//!
//! - [`GatewayDefaults`] -- process-wide defaults loaded once at startup from
//!   an optional TOML file and the environment.  Read-only afterwards.
//! - [`EffectiveConfig`] -- resolved fresh for every request by layering the
//!   caller's [`ProviderCredential`] over the defaults, field by field.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::llm::adapter::ProviderAdapter;
use crate::llm::anthropic::AnthropicAdapter;
use crate::llm::openai::OpenAiAdapter;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Public OpenAI API base URL, used when nothing else configures one.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Public Anthropic API base URL, used when nothing else configures one.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default timeout for non-streaming upstream calls.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which upstream API family a request is spoken to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Provider {
    /// OpenAI Chat Completions API and anything that mimics it.
    #[default]
    #[serde(rename = "openai-compatible", alias = "openai")]
    OpenAiCompatible,
    /// Anthropic Messages API and anything that mimics it.
    #[serde(rename = "anthropic-compatible", alias = "anthropic")]
    AnthropicCompatible,
}

impl Provider {
    /// Wire name used in JSON and environment variables.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatible",
            Self::AnthropicCompatible => "anthropic-compatible",
        }
    }

    /// The adapter that speaks this provider's wire format.
    pub fn adapter(self) -> &'static dyn ProviderAdapter {
        match self {
            Self::OpenAiCompatible => &OpenAiAdapter,
            Self::AnthropicCompatible => &AnthropicAdapter,
        }
    }

    /// Public endpoint for this provider.
    pub fn public_base_url(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => OPENAI_BASE_URL,
            Self::AnthropicCompatible => ANTHROPIC_BASE_URL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai-compatible" | "openai" => Ok(Self::OpenAiCompatible),
            "anthropic-compatible" | "anthropic" => Ok(Self::AnthropicCompatible),
            other => Err(LlmError::ConfigError {
                reason: format!("unknown provider `{other}`"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Caller-supplied credential
// ---------------------------------------------------------------------------

/// Bring-your-own-key credential supplied with a chat request.
///
/// Omitted fields deserialize as empty and fall back to the defaults.  An
/// omitted `provider` means the server's own provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
}

impl ProviderCredential {
    /// A credential with an empty API key is treated as absent.
    pub fn is_usable(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &mask(&self.api_key))
            .field("model_id", &self.model_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Process-wide defaults
// ---------------------------------------------------------------------------

/// Server-side defaults, established once at startup.
///
/// Every field is optional except the numeric limits; a missing value is
/// only an error once a request actually needs it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayDefaults {
    /// Provider used when the caller supplies no credential.
    pub provider: Option<Provider>,
    /// Upstream base URL (e.g. `https://api.openai.com/v1`).
    pub base_url: Option<String>,
    /// Server-owned API key.
    pub api_key: Option<String>,
    /// Default model identifier.
    pub model_id: Option<String>,
    /// Maximum tokens the upstream may generate per response.
    pub max_tokens: u32,
    /// Timeout for non-streaming upstream calls, in seconds.
    pub timeout_secs: u64,
    /// Shared secret callers must present when they bring no credential.
    pub access_password: Option<String>,
}

impl Default for GatewayDefaults {
    fn default() -> Self {
        Self {
            provider: None,
            base_url: None,
            api_key: None,
            model_id: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            access_password: None,
        }
    }
}

impl fmt::Debug for GatewayDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayDefaults")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask))
            .field("model_id", &self.model_id)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("access_password", &self.access_password.as_deref().map(mask))
            .finish()
    }
}

impl GatewayDefaults {
    /// Load defaults from an optional TOML file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| LlmError::ConfigError {
                    reason: format!("failed to read {}: {e}", path.display()),
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        base.with_vars(std::env::vars())
    }

    /// Parse defaults from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CHAT_*` / `ACCESS_PASSWORD` variables on top of `self`.
    ///
    /// Empty values are ignored so that a blank line in `.env` does not wipe
    /// out a value from the config file.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }

            match key.as_ref() {
                "CHAT_PROVIDER" => self.provider = Some(value.parse()?),
                "CHAT_BASE_URL" => self.base_url = Some(value),
                "CHAT_API_KEY" => self.api_key = Some(value),
                "CHAT_MODEL" => self.model_id = Some(value),
                "CHAT_MAX_TOKENS" => self.max_tokens = parse_number("CHAT_MAX_TOKENS", &value)?,
                "CHAT_TIMEOUT_SECS" => {
                    self.timeout_secs = parse_number("CHAT_TIMEOUT_SECS", &value)?
                }
                "ACCESS_PASSWORD" => self.access_password = Some(value),
                _ => {}
            }
        }

        Ok(self)
    }

    /// The provider served when a request carries no usable credential.
    pub fn effective_provider(&self) -> Provider {
        self.provider.unwrap_or_default()
    }

    /// Whether a non-empty server API key is configured.
    pub fn has_api_key(&self) -> bool {
        non_empty(self.api_key.as_deref()).is_some()
    }

    /// The configured shared password, if any.
    pub fn password(&self) -> Option<&str> {
        non_empty(self.access_password.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Per-request configuration
// ---------------------------------------------------------------------------

/// Fully resolved upstream settings for a single request.
///
/// Never cached and never written back into [`GatewayDefaults`].
#[derive(Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
    pub max_tokens: u32,
}

impl EffectiveConfig {
    /// Layer `credential` over `defaults`.
    ///
    /// A usable credential selects the provider.  Each of its string fields
    /// wins when non-empty; otherwise the default is used, but only if the
    /// defaults target the same provider.  The base URL finally falls back to
    /// the provider's public endpoint.
    pub fn resolve(
        defaults: &GatewayDefaults,
        credential: Option<&ProviderCredential>,
    ) -> Result<Self> {
        let credential = credential.filter(|c| c.is_usable());
        let provider = credential
            .and_then(|c| c.provider)
            .unwrap_or_else(|| defaults.effective_provider());
        let defaults_apply = defaults.effective_provider() == provider;

        let api_key = pick(
            credential.map(|c| c.api_key.as_str()),
            defaults.api_key.as_deref(),
            defaults_apply,
        )
        .ok_or_else(|| LlmError::MissingApiKey {
            provider: provider.to_string(),
        })?;

        let model_id = pick(
            credential.map(|c| c.model_id.as_str()),
            defaults.model_id.as_deref(),
            defaults_apply,
        )
        .ok_or_else(|| LlmError::NoModelConfigured {
            provider: provider.to_string(),
        })?;

        let base_url = pick(
            credential.map(|c| c.base_url.as_str()),
            defaults.base_url.as_deref(),
            defaults_apply,
        )
        .unwrap_or_else(|| provider.public_base_url().to_owned());

        Ok(Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model_id,
            max_tokens: defaults.max_tokens,
        })
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &mask(&self.api_key))
            .field("model_id", &self.model_id)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// First non-empty of `field` and (when `use_default`) `default`.
fn pick(field: Option<&str>, default: Option<&str>, use_default: bool) -> Option<String> {
    non_empty(field)
        .or_else(|| non_empty(default.filter(|_| use_default)))
        .map(str::to_owned)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| LlmError::ConfigError {
        reason: format!("{name} must be a positive integer, got `{value}`"),
    })
}

/// Render a secret as `****` plus its last four characters.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
