use color_eyre::eyre::{self, eyre, WrapErr};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_JOBS: usize = 2;
const DEFAULT_MAX_UPLOAD: usize = 20 * 1024 * 1024;

/// Service settings
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub address: IpAddr,
    pub soffice: Option<PathBuf>,
    pub timeout: Duration,
    pub max_jobs: usize,
    pub max_upload: usize,
    pub public_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            soffice: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_jobs: DEFAULT_MAX_JOBS,
            max_upload: DEFAULT_MAX_UPLOAD,
            public_url: None,
        }
    }
}

impl Config {
    /// Read the configs from Env Variables and then fall back to the .env file.
    pub fn from_env() -> Result<Config, eyre::Error> {
        Config::from_env_file(Path::new(".env"))
    }

    /// Read the configs from Env Variables and then fall back to the given file.
    /// A missing file is the same as an empty one.
    pub fn from_env_file(path: &Path) -> Result<Config, eyre::Error> {
        let file_vars = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter
                .collect::<Result<HashMap<String, String>, _>>()
                .wrap_err_with(|| format!("Invalid env file: {}", path.display()))?,
            Err(err) if err.not_found() => HashMap::new(),
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("Invalid env file: {}", path.display()))
            }
        };

        Config::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.get(name).cloned())
        })
    }

    /// Build the config from any name to value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Config, eyre::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let max_jobs = parse_var(&lookup, "MAX_JOBS")?.unwrap_or(defaults.max_jobs);
        if max_jobs == 0 {
            return Err(eyre!("MAX_JOBS must be at least 1"));
        }

        let timeout = parse_var::<u64, _>(&lookup, "CONVERT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        if timeout.is_zero() {
            return Err(eyre!("CONVERT_TIMEOUT_SECS must be at least 1"));
        }

        Ok(Config {
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            address: parse_var(&lookup, "HOST")?.unwrap_or(defaults.address),
            soffice: non_empty(&lookup, "SOFFICE_PATH").map(PathBuf::from),
            timeout,
            max_jobs,
            max_upload: parse_var(&lookup, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload),
            public_url: non_empty(&lookup, "PUBLIC_URL"),
        })
    }

    /// Socket the web service binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Where the OpenAPI document says the API lives
    pub fn api_url(&self) -> String {
        match &self.public_url {
            Some(url) => format!("{}/api", url.trim_end_matches('/')),
            None => "/api".to_string(),
        }
    }
}

/// Pull a variable, treating blank values as unset
fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Pull and parse a variable, failing loudly on junk
fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, eyre::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name)
        .map(|value| {
            value
                .parse::<T>()
                .wrap_err_with(|| format!("Invalid value for {}: `{}`", name, value))
        })
        .transpose()
}
