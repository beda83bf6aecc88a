use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Deserialize;
use tracing::warn;

use crate::paths::resolve_path;

pub const DEFAULT_PREF_PATH: &str = "conf/pref.toml";
pub const DEFAULT_API_URL: &str = "https://nskp-io.goskope.com/api/v2/nsiq/urllookup";
const DEFAULT_LISTEN: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_TEMPLATE: &str = "static/blocked.html";
const DEFAULT_LOGO: &str = "static/netskope-logo.png";

/// On-disk preferences. Every field is optional; unset values fall back to
/// built-in defaults and are overridden by environment or CLI flags.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Pref {
    #[serde(default)]
    pub server: ServerPref,
    #[serde(default)]
    pub api: ApiPref,
    #[serde(default)]
    pub assets: AssetsPref,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerPref {
    pub listen: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ApiPref {
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AssetsPref {
    pub template: Option<String>,
    pub logo: Option<String>,
}

/// Settings taken from the environment or command line. These win over
/// the pref file.
#[derive(Args, Default, Clone)]
pub struct Overrides {
    /// Address to listen on
    #[arg(long, global = true, env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Port to listen on
    #[arg(long, global = true, env = "PORT")]
    pub port: Option<u16>,

    /// Categorization API endpoint
    #[arg(long, global = true, env = "API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the categorization API
    #[arg(long, global = true, env = "API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Total timeout for one categorization call
    #[arg(long, global = true, env = "API_TIMEOUT_SECONDS")]
    pub api_timeout_seconds: Option<u64>,

    /// Block page template with {{URL}} and {{CATEGORY}} placeholders
    #[arg(long, global = true, env = "BLOCK_TEMPLATE")]
    pub template: Option<String>,

    /// Logo served next to the block page
    #[arg(long, global = true, env = "BLOCK_LOGO")]
    pub logo: Option<String>,
}

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub port: u16,
    pub api: ApiConfig,
    pub template_path: PathBuf,
    pub logo_path: PathBuf,
}

#[derive(Clone)]
pub struct ApiConfig {
    pub url: reqwest::Url,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url.as_str())
            .field("token", &if self.token.is_empty() { "<empty>" } else { "<redacted>" })
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn resolve(pref: Pref, overrides: Overrides, base_dir: &Path) -> Result<Self> {
        let listen = overrides
            .listen
            .or(pref.server.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let port = overrides.port.or(pref.server.port).unwrap_or(DEFAULT_PORT);

        let raw_url = overrides
            .api_url
            .or(pref.api.url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let url = reqwest::Url::parse(&raw_url)
            .with_context(|| format!("invalid categorization api url {raw_url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("categorization api url must be http or https, got {}", url.scheme());
        }

        let token = overrides.api_token.or(pref.api.token).unwrap_or_default();
        if token.is_empty() {
            warn!("API_TOKEN is empty; categorization requests will likely be rejected");
        }

        let timeout_seconds = overrides
            .api_timeout_seconds
            .or(pref.api.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            bail!("api timeout must be greater than zero");
        }

        let template = overrides
            .template
            .or(pref.assets.template)
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        let logo = overrides
            .logo
            .or(pref.assets.logo)
            .unwrap_or_else(|| DEFAULT_LOGO.to_string());

        Ok(Self {
            listen,
            port,
            api: ApiConfig {
                url,
                token,
                timeout: Duration::from_secs(timeout_seconds),
            },
            template_path: resolve_path(base_dir, template),
            logo_path: resolve_path(base_dir, logo),
        })
    }

    pub fn listen_addr(&self) -> String {
        if self.listen.contains(':') && !self.listen.starts_with('[') {
            format!("[{}]:{}", self.listen, self.port)
        } else {
            format!("{}:{}", self.listen, self.port)
        }
    }
}

pub fn load_pref(path: impl AsRef<Path>) -> Result<Pref> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read pref file {}", path.display()))?;
    let pref: Pref = toml::from_str(&text)
        .with_context(|| format!("failed to parse pref file {}", path.display()))?;
    Ok(pref)
}

/// Load the pref file given on the command line, or the default one if it
/// exists. Only an explicitly requested file is required to be present.
pub fn load_pref_or_default(explicit: Option<&Path>, base_dir: &Path) -> Result<Pref> {
    match explicit {
        Some(path) => load_pref(path),
        None => {
            let path = resolve_path(base_dir, DEFAULT_PREF_PATH);
            if path.exists() {
                load_pref(path)
            } else {
                Ok(Pref::default())
            }
        }
    }
}
