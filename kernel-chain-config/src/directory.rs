//! Static address book of known contracts per chain.

use std::{collections::HashMap, str::FromStr, sync::LazyLock};

use alloy_primitives::Address;
use kernel_types::ChainId;
use serde::Deserialize;
use tracing::error;

/// Name recorded for addresses missing from the directory.
pub const UNKNOWN_CONTRACT: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractLabel {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

type RawDirectory = HashMap<String, HashMap<String, ContractLabel>>;

static DIRECTORY: LazyLock<HashMap<(ChainId, Address), ContractLabel>> = LazyLock::new(|| {
    match parse_directory(include_str!("../data/directory.toml")) {
        Ok(directory) => directory,
        Err(err) => {
            error!(?err, "contract directory failed to parse, every address is unknown");
            HashMap::new()
        }
    }
});

fn parse_directory(
    contents: &str,
) -> Result<HashMap<(ChainId, Address), ContractLabel>, DirectoryError> {
    let raw: RawDirectory = toml::from_str(contents)?;

    let mut directory = HashMap::new();
    for (chain, entries) in raw {
        let chain_id =
            ChainId::from_str(&chain).map_err(|_| DirectoryError::ChainId(chain.clone()))?;
        for (address, label) in entries {
            // parsing normalizes the checksum casing
            let address =
                Address::from_str(&address).map_err(|_| DirectoryError::Address(address.clone()))?;
            directory.insert((chain_id, address), label);
        }
    }
    Ok(directory)
}

#[derive(Debug, thiserror::Error)]
enum DirectoryError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("invalid chain id {0:?}")]
    ChainId(String),
    #[error("invalid address {0:?}")]
    Address(String),
}

/// Directory entry for `address` on `chain_id`, if any.
pub fn contract_label(chain_id: ChainId, address: Address) -> Option<&'static ContractLabel> {
    DIRECTORY.get(&(chain_id, address))
}

/// Display name for `address`, or [`UNKNOWN_CONTRACT`].
pub fn contract_name(chain_id: ChainId, address: Address) -> &'static str {
    contract_label(chain_id, address)
        .map(|label| label.name.as_str())
        .unwrap_or(UNKNOWN_CONTRACT)
}
