//! Environment variable configuration, layered over the INI file.
//!
//! `[postgres] host` is read from `POSTGRES_HOST`, `[feed] api_key` from
//! `FEED_API_KEY`, and so on.

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::ports::config_port::ConfigPort;
use std::collections::HashMap;

pub fn env_key(section: &str, key: &str) -> String {
    format!("{}_{}", section, key).to_uppercase()
}

pub struct EnvConfigAdapter {
    vars: HashMap<String, String>,
}

impl EnvConfigAdapter {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigPort for EnvConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.vars.get(&env_key(section, key)).cloned()
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .and_then(|v| FileConfigAdapter::parse_bool(&v))
            .unwrap_or(default)
    }
}

/// Environment first, then the file.
pub struct LayeredConfig<E, F> {
    env: E,
    file: F,
}

impl<E: ConfigPort, F: ConfigPort> LayeredConfig<E, F> {
    pub fn new(env: E, file: F) -> Self {
        Self { env, file }
    }
}

impl<E: ConfigPort, F: ConfigPort> ConfigPort for LayeredConfig<E, F> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.env
            .get_string(section, key)
            .or_else(|| self.file.get_string(section, key))
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        let fallback = self.file.get_int(section, key, default);
        self.env.get_int(section, key, fallback)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        let fallback = self.file.get_double(section, key, default);
        self.env.get_double(section, key, fallback)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        let fallback = self.file.get_bool(section, key, default);
        self.env.get_bool(section, key, fallback)
    }
}
