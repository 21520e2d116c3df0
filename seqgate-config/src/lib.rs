use std::{path::PathBuf, time::Duration};

use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "SEQGATE_PORT", default = "5001")]
    pub port: u16,
    #[envconfig(from = "SEQGATE_HOST", default = "0.0.0.0")]
    pub host: String,
    #[envconfig(from = "SEQGATE_LOG_LEVEL", default = "info")]
    pub log_level: String,
    #[envconfig(from = "SEQGATE_DATA_DIR", default = "./data")]
    pub data_dir: PathBuf,
    /// Comma separated `sat=keyspace[:secure]` pairs.
    #[envconfig(
        from = "SEQGATE_SAT_MAPPING",
        default = "4=satncbi_extended,5=satprot,23=satsecure:secure"
    )]
    pub sat_mapping: String,
    //Blob size in bytes under which slim/smart requests get every chunk
    #[envconfig(from = "SEQGATE_SEND_BLOB_IF_SMALL", default = "10240")]
    pub send_blob_if_small: u64,
    #[envconfig(from = "SEQGATE_RESEND_TIMEOUT_MS", default = "200")]
    pub resend_timeout_ms: u64,
    #[envconfig(from = "SEQGATE_EXCLUDE_CACHE_MAX_SIZE", default = "1000")]
    pub exclude_cache_max_size: usize,
    #[envconfig(from = "SEQGATE_EXCLUDE_CACHE_INACTIVITY_SECS", default = "60")]
    pub exclude_cache_inactivity_secs: u64,
    #[envconfig(from = "SEQGATE_SPLIT_INDEX_CACHE_SIZE", default = "1000")]
    pub split_index_cache_size: usize,
    #[envconfig(from = "SEQGATE_PROPERTIES_CACHE_SIZE", default = "10000")]
    pub properties_cache_size: u64,
    /// How long a "latest version" properties answer may be served from memory.
    #[envconfig(from = "SEQGATE_PROPERTIES_CACHE_TTL_SECS", default = "60")]
    pub properties_cache_ttl_secs: u64,
    #[envconfig(from = "SEQGATE_SPLIT_INDEX_DECODERS", default = "4")]
    pub split_index_decoders: usize,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }

    pub fn resend_timeout(&self) -> Duration {
        Duration::from_millis(self.resend_timeout_ms)
    }

    pub fn exclude_cache_inactivity(&self) -> Duration {
        Duration::from_secs(self.exclude_cache_inactivity_secs)
    }

    pub fn properties_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.properties_cache_ttl_secs)
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
    /// The directory holding one sub-directory per keyspace
    pub static ref KEYSPACES_DIR_PATH: PathBuf = CONFIG.data_dir.join("keyspaces");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = Config::init_from_hashmap(&HashMap::new()).expect("defaults");
        assert_eq!(config.port, 5001);
        assert_eq!(config.send_blob_if_small, 10240);
        assert_eq!(config.resend_timeout(), Duration::from_millis(200));
        assert!(config.sat_mapping.contains("23=satsecure:secure"));
        assert_eq!(config.properties_cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_read() {
        let mut env = HashMap::new();
        env.insert("SEQGATE_RESEND_TIMEOUT_MS".to_string(), "1500".to_string());
        env.insert("SEQGATE_SPLIT_INDEX_DECODERS".to_string(), "2".to_string());
        let config = Config::init_from_hashmap(&env).expect("config");
        assert_eq!(config.resend_timeout(), Duration::from_millis(1500));
        assert_eq!(config.split_index_decoders, 2);
    }
}
