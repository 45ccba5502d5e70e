//! Typed dashboard configuration.
//!
//! The JSON document is validated once at load time. Top-level shape errors
//! are fatal; malformed instance, organization or repository entries are
//! skipped and reported as [`ConfigWarning`]s.

use crate::{
    Auth, ClientOptions, Error,
    hostedbuild::{DEFAULT_API_URL, DEFAULT_WEB_URL, Repository},
    upstream::endpoint::normalize_base_url,
};
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, num::NonZeroUsize, path::Path, time::Duration};

pub const ENV_PREFIX: &str = "CCD_";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// A skipped or ignored configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Location of the entry, e.g. `jobServers[2]`.
    pub path: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobServerConfig {
    pub name: String,
    pub url: String,
    #[serde(default, alias = "brokenJobsUrl")]
    pub override_url: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedBuildConfig {
    pub access_token: String,
    pub api_url: String,
    pub web_url: String,
    pub organizations: Vec<OrganizationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationConfig {
    pub name: String,
    /// Falls back to [`HostedBuildConfig::access_token`].
    pub access_token: Option<String>,
    pub repos: Vec<Repository>,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub bind_address: String,
    pub debug: bool,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_concurrency: Option<NonZeroUsize>,
    pub job_servers: Vec<JobServerConfig>,
    pub hosted_build: Option<HostedBuildConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let client = ClientOptions::default();
        Self {
            username: None,
            password: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            debug: false,
            request_timeout: client.timeout,
            connect_timeout: client.connect_timeout,
            max_concurrency: None,
            job_servers: Vec::new(),
            hosted_build: None,
        }
    }
}

/// A parsed configuration together with the entries that were skipped.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DashboardConfig,
    pub warnings: Vec<ConfigWarning>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    username: Option<String>,
    password: Option<String>,
    bind_address: Option<String>,
    debug: bool,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    max_concurrency: Option<usize>,
    job_servers: Vec<Value>,
    hosted_build: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHostedBuild {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    organizations: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrganization {
    #[serde(default)]
    name: String,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    repos: Vec<Value>,
}

#[derive(Deserialize)]
struct RawRepo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    branch: Option<String>,
}

impl DashboardConfig {
    pub fn from_json_str(json: &str) -> Result<LoadedConfig, Error> {
        let raw: RawConfig = serde_json::from_str(json).map_err(|err| Error::InvalidConfig {
            message: "configuration is not a valid document".into(),
            source: Some(Box::new(err)),
        })?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<LoadedConfig, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| Error::InvalidConfig {
            message: format!("cannot read configuration file '{}'", path.display()).into(),
            source: Some(Box::new(err)),
        })?;
        Self::from_json_str(&text)
    }

    /// Like [`DashboardConfig::from_path`], but a missing file yields the defaults.
    pub fn from_path_or_default(path: impl AsRef<Path>) -> Result<LoadedConfig, Error> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no configuration file found, using defaults");
            return Ok(LoadedConfig {
                config: Self::default(),
                warnings: Vec::new(),
            });
        }
        Self::from_path(path)
    }

    fn from_raw(raw: RawConfig) -> LoadedConfig {
        let mut warnings = Vec::new();
        let defaults = Self::default();

        let max_concurrency = match raw.max_concurrency {
            Some(0) => {
                warnings.push(ConfigWarning::new(
                    "maxConcurrency",
                    "must be positive, ignoring bound",
                ));
                None
            }
            other => other.and_then(NonZeroUsize::new),
        };

        let job_servers = raw
            .job_servers
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| parse_job_server(i, entry, &mut warnings))
            .collect();

        let hosted_build = raw
            .hosted_build
            .and_then(|section| parse_hosted_build(section, &mut warnings));

        for warning in &warnings {
            tracing::warn!(path = %warning.path, "{}", warning.message);
        }

        LoadedConfig {
            config: Self {
                username: raw.username,
                password: raw.password,
                bind_address: raw.bind_address.unwrap_or(defaults.bind_address),
                debug: raw.debug,
                request_timeout: raw
                    .request_timeout_secs
                    .map_or(defaults.request_timeout, Duration::from_secs),
                connect_timeout: raw
                    .connect_timeout_secs
                    .map_or(defaults.connect_timeout, Duration::from_secs),
                max_concurrency,
                job_servers,
                hosted_build,
            },
            warnings,
        }
    }

    /// Applies `CCD_USERNAME`, `CCD_PASSWORD`, `CCD_BINDADDRESS` and `CCD_DEBUG`.
    ///
    /// Pass `std::env::vars()` in production. Unparseable values are reported and ignored.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Vec<ConfigWarning>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut warnings = Vec::new();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name.to_ascii_uppercase().as_str() {
                "USERNAME" => self.username = Some(value.into()),
                "PASSWORD" => self.password = Some(value.into()),
                "BINDADDRESS" => self.bind_address = value.into(),
                "DEBUG" => {
                    let value = value.into();
                    match value.trim().to_ascii_lowercase().as_str() {
                        "1" | "true" | "yes" | "on" => self.debug = true,
                        "0" | "false" | "no" | "off" | "" => self.debug = false,
                        _ => warnings.push(ConfigWarning::new(
                            key.as_ref(),
                            format!("'{value}' is not a boolean"),
                        )),
                    }
                }
                _ => {}
            }
        }
        for warning in &warnings {
            tracing::warn!(path = %warning.path, "{}", warning.message);
        }
        warnings
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            debug: self.debug,
            ..ClientOptions::default()
        }
    }

    /// Basic credentials for job servers, when both parts are set.
    #[must_use]
    pub fn job_server_auth(&self) -> Option<Auth> {
        Auth::basic_if_present(self.username.as_deref(), self.password.as_deref())
    }
}

fn parse_job_server(
    index: usize,
    entry: Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<JobServerConfig> {
    let path = format!("jobServers[{index}]");
    let parsed: JobServerConfig = match serde_json::from_value(entry) {
        Ok(parsed) => parsed,
        Err(err) => {
            warnings.push(ConfigWarning::new(path, format!("skipped: {err}")));
            return None;
        }
    };
    if parsed.name.trim().is_empty() || parsed.url.trim().is_empty() {
        warnings.push(ConfigWarning::new(path, "skipped: name and url are required"));
        return None;
    }
    if let Err(err) = normalize_base_url(&parsed.url) {
        warnings.push(ConfigWarning::new(path, format!("skipped: {err}")));
        return None;
    }
    Some(parsed)
}

fn parse_hosted_build(
    section: Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<HostedBuildConfig> {
    let raw: RawHostedBuild = match serde_json::from_value(section) {
        Ok(raw) => raw,
        Err(err) => {
            warnings.push(ConfigWarning::new("hostedBuild", format!("skipped: {err}")));
            return None;
        }
    };

    let api_url = raw.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_owned());
    if let Err(err) = normalize_base_url(&api_url) {
        warnings.push(ConfigWarning::new("hostedBuild.apiUrl", format!("skipped: {err}")));
        return None;
    }

    let mut organizations = Vec::new();
    for (i, entry) in raw.organizations.into_iter().enumerate() {
        let path = format!("hostedBuild.organizations[{i}]");
        let org: RawOrganization = match serde_json::from_value(entry) {
            Ok(org) => org,
            Err(err) => {
                warnings.push(ConfigWarning::new(path, format!("skipped: {err}")));
                continue;
            }
        };
        if org.name.trim().is_empty() {
            warnings.push(ConfigWarning::new(path, "skipped: name is required"));
            continue;
        }

        let mut repos = Vec::new();
        for (j, repo) in org.repos.into_iter().enumerate() {
            let repo_path = format!("{path}.repos[{j}]");
            match serde_json::from_value::<RawRepo>(repo) {
                Ok(repo) if !repo.name.trim().is_empty() => {
                    repos.push(Repository::new(&org.name, repo.name, repo.branch.as_deref()));
                }
                Ok(_) => warnings.push(ConfigWarning::new(repo_path, "skipped: name is required")),
                Err(err) => warnings.push(ConfigWarning::new(repo_path, format!("skipped: {err}"))),
            }
        }

        organizations.push(OrganizationConfig {
            name: org.name,
            access_token: org.access_token.filter(|t| !t.is_empty()),
            repos,
        });
    }

    Some(HostedBuildConfig {
        access_token: raw.access_token,
        api_url,
        web_url: raw.web_url.unwrap_or_else(|| DEFAULT_WEB_URL.to_owned()),
        organizations,
    })
}
