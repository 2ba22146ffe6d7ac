use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dao_wallet::{Address, AddressError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_NETWORK: &str = "DAO_NETWORK";
pub const ENV_CHAIN_ID: &str = "DAO_CHAIN_ID";
pub const ENV_RPC_URL: &str = "DAO_RPC_URL";
pub const ENV_WALLET_URL: &str = "DAO_WALLET_URL";
pub const ENV_DROP_ADDRESS: &str = "BUNDLE_DROP_ADDRESS";
pub const ENV_TOKEN_ADDRESS: &str = "TOKEN_MODULE_ADDRESS";
pub const ENV_VOTE_ADDRESS: &str = "VOTE_MODULE_ADDRESS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} is not set")]
    Missing { field: &'static str },
    #[error("invalid {field}: {source}")]
    Address { field: &'static str, source: AddressError },
    #[error("invalid {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
    #[error("unknown network {0:?}; set chain_id explicitly")]
    UnknownNetwork(String),
}

/// Contract addresses of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    pub drop: Address,
    pub token: Address,
    pub vote: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoConfig {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub drop_address: Option<Address>,
    #[serde(default)]
    pub token_address: Option<Address>,
    #[serde(default)]
    pub vote_address: Option<Address>,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_wallet_url")]
    pub wallet_url: String,
    #[serde(default = "default_marketplace_url")]
    pub marketplace_url: Option<String>,
}

fn default_network() -> String {
    "rinkeby".into()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".into()
}

fn default_wallet_url() -> String {
    "http://127.0.0.1:1248".into()
}

fn default_marketplace_url() -> Option<String> {
    Some("https://testnets.opensea.io/assets".into())
}

impl Default for DaoConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            chain_id: None,
            drop_address: None,
            token_address: None,
            vote_address: None,
            rpc_url: default_rpc_url(),
            wallet_url: default_wallet_url(),
            marketplace_url: default_marketplace_url(),
        }
    }
}

/// Chain id of a well-known network name.
pub fn chain_id_for(network: &str) -> Option<u64> {
    Some(match network.to_ascii_lowercase().as_str() {
        "mainnet" | "ethereum" => 1,
        "ropsten" => 3,
        "rinkeby" => 4,
        "goerli" => 5,
        "kovan" => 42,
        "sepolia" => 11_155_111,
        "polygon" | "matic" => 137,
        "mumbai" => 80_001,
        _ => return None,
    })
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|mut dir| {
        dir.push(".dao");
        dir.push("config.toml");
        dir
    })
}

impl DaoConfig {
    /// Load `path` (or the default location), apply environment overrides
    /// and validate. A missing default file yields defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(network) = lookup(ENV_NETWORK) {
            self.network = network;
        }
        if let Some(raw) = lookup(ENV_CHAIN_ID) {
            let id = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "chain_id",
                value: raw.clone(),
            })?;
            self.chain_id = Some(id);
        }
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(url) = lookup(ENV_WALLET_URL) {
            self.wallet_url = url;
        }
        for (key, field, slot) in [
            (ENV_DROP_ADDRESS, "drop_address", &mut self.drop_address),
            (ENV_TOKEN_ADDRESS, "token_address", &mut self.token_address),
            (ENV_VOTE_ADDRESS, "vote_address", &mut self.vote_address),
        ] {
            if let Some(raw) = lookup(key) {
                let address = raw
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::Address { field, source })?;
                *slot = Some(address);
            }
        }
        Ok(())
    }

    /// Explicit `chain_id`, else the id of a well-known `network`.
    pub fn resolved_chain_id(&self) -> Result<u64, ConfigError> {
        match self.chain_id {
            Some(id) => Ok(id),
            None => chain_id_for(&self.network)
                .ok_or_else(|| ConfigError::UnknownNetwork(self.network.clone())),
        }
    }

    pub fn contracts(&self) -> Result<Contracts, ConfigError> {
        Ok(Contracts {
            drop: self.drop_address.ok_or(ConfigError::Missing { field: "drop_address" })?,
            token: self.token_address.ok_or(ConfigError::Missing { field: "token_address" })?,
            vote: self.vote_address.ok_or(ConfigError::Missing { field: "vote_address" })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_chain_id()?;
        self.contracts()?;
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing { field: "rpc_url" });
        }
        if self.wallet_url.trim().is_empty() {
            return Err(ConfigError::Missing { field: "wallet_url" });
        }
        Ok(())
    }
}
