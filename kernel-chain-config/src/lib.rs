use alloy_primitives::{address, b256, Address, B256};
use kernel_types::{ChainId, LogMeta};
use thiserror::Error;

pub mod directory;

pub use directory::{contract_label, contract_name, ContractLabel, UNKNOWN_CONTRACT};

/// CHAIN_ID
pub const ETHEREUM_MAINNET_CHAIN_ID: ChainId = 1;
pub const OPTIMISM_CHAIN_ID: ChainId = 10;
pub const BASE_CHAIN_ID: ChainId = 8453;
pub const ARBITRUM_CHAIN_ID: ChainId = 42161;
pub const BERACHAIN_CHAIN_ID: ChainId = 80094;
pub const SEPOLIA_CHAIN_ID: ChainId = 11155111;

pub const SUPPORTED_CHAIN_IDS: [ChainId; 6] = [
    ETHEREUM_MAINNET_CHAIN_ID,
    OPTIMISM_CHAIN_ID,
    BASE_CHAIN_ID,
    ARBITRUM_CHAIN_ID,
    BERACHAIN_CHAIN_ID,
    SEPOLIA_CHAIN_ID,
];

/// Etherscan v2 multichain endpoint, selected per request by `chainid`.
pub const ETHERSCAN_V2_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Default block explorer API for a chain.
pub fn default_explorer_url(chain_id: ChainId) -> Result<&'static str, ChainConfigError> {
    match chain_id {
        ARBITRUM_CHAIN_ID => Ok("https://api.arbiscan.io/api"),
        BASE_CHAIN_ID => Ok("https://api.basescan.org/api"),
        BERACHAIN_CHAIN_ID => Ok("https://api.berascan.com/api"),
        ETHEREUM_MAINNET_CHAIN_ID | OPTIMISM_CHAIN_ID | SEPOLIA_CHAIN_ID => {
            Ok(ETHERSCAN_V2_API_URL)
        }
        _ => Err(ChainConfigError::UnsupportedChainId(chain_id)),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainConfigError {
    #[error("unsupported chain id {0}")]
    UnsupportedChainId(ChainId),
}

/// Where and when a contract was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub creation_transaction_hash: B256,
    pub creation_block_number: u64,
    pub creation_timestamp: u64,
}

impl Deployment {
    /// Log coordinates used for rows synthesized from the deployment itself,
    /// which emits no log of its own.
    pub fn genesis_log(&self, chain_id: ChainId) -> LogMeta {
        LogMeta {
            chain_id,
            transaction_hash: self.creation_transaction_hash,
            log_index: 0,
            block_number: self.creation_block_number,
            timestamp: self.creation_timestamp,
        }
    }
}

/// The three contracts whose events drive the indexer on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDeployment {
    pub chain_id: ChainId,
    pub kernel: Deployment,
    pub roles: Deployment,
    pub roles_admin: Deployment,
}

impl ChainDeployment {
    pub fn for_chain(chain_id: ChainId) -> Result<&'static ChainDeployment, ChainConfigError> {
        DEPLOYMENTS
            .iter()
            .find(|deployment| deployment.chain_id == chain_id)
            .ok_or(ChainConfigError::UnsupportedChainId(chain_id))
    }

    /// First block any of the tracked contracts can have emitted a log.
    pub fn start_block(&self) -> u64 {
        self.kernel
            .creation_block_number
            .min(self.roles.creation_block_number)
            .min(self.roles_admin.creation_block_number)
    }
}

const DEPLOYMENTS: [ChainDeployment; 6] = [
    ChainDeployment {
        chain_id: ETHEREUM_MAINNET_CHAIN_ID,
        kernel: Deployment {
            address: address!("2286d7f9639e8158FaD1169e76d1FbC38247f54b"),
            creation_transaction_hash: b256!(
                "da3facf1f77124cdf4bddff8fa09221354ad663ec2f8b03dcc4657086ebf5e72"
            ),
            creation_block_number: 15998125,
            creation_timestamp: 1668790475,
        },
        roles: Deployment {
            address: address!("6CAfd730Dc199Df73C16420C4fCAb18E3afbfA59"),
            creation_transaction_hash: b256!(
                "bf00e197abe1961dc9992b29c5471949df1947be69d462ff48bb574aed2fab42"
            ),
            creation_block_number: 15998132,
            creation_timestamp: 1668789359,
        },
        roles_admin: Deployment {
            address: address!("b216d714d91eeC4F7120a732c11428857C659eC8"),
            creation_transaction_hash: b256!(
                "cc820ca2f75e32ae5f98eb861c08d663501878f18b8888983bec07a007da6b78"
            ),
            creation_block_number: 15998137,
            creation_timestamp: 1668789419,
        },
    },
    ChainDeployment {
        chain_id: ARBITRUM_CHAIN_ID,
        kernel: Deployment {
            address: address!("eac3eC0CC130f4826715187805d1B50e861F2DaC"),
            creation_transaction_hash: b256!(
                "3f55f2ce3af9f803343c6b3361ccde1cf4853c931c9410ad935586cc3c21519d"
            ),
            creation_block_number: 85886527,
            creation_timestamp: 1682868260,
        },
        roles: Deployment {
            address: address!("FF5F09D5efE13A9a424F30EC2e1af89D867834d6"),
            creation_transaction_hash: b256!(
                "87fd19b730e0fc2223b0ead36454ac21ac942abdc3162e0abb65983b6f634043"
            ),
            creation_block_number: 85886592,
            creation_timestamp: 1682868279,
        },
        roles_admin: Deployment {
            address: address!("69168c08AcF66f002fd02E1B169f38C022c93b70"),
            creation_transaction_hash: b256!(
                "266c2c373e058c9f3c9336709f3feade66d62702d7abfc211504da3327cc1e48"
            ),
            creation_block_number: 85886660,
            creation_timestamp: 1682868296,
        },
    },
    ChainDeployment {
        chain_id: BASE_CHAIN_ID,
        kernel: Deployment {
            address: address!("18878Df23e2a36f81e820e4b47b4A40576D3159C"),
            creation_transaction_hash: b256!(
                "005ee16349882fa0b7a31470b2c8049d40bb387c2aeef045b6baa75566d8a39c"
            ),
            creation_block_number: 13204831,
            creation_timestamp: 1713199009,
        },
        roles: Deployment {
            address: address!("bC9eE0D911739cBc72cd094ADA26F56E0C49EeAE"),
            creation_transaction_hash: b256!(
                "379915686d42077d6a0891f07113c9e4c8574fdb4aec08aa1ea43bd6d471589c"
            ),
            creation_block_number: 13204839,
            creation_timestamp: 1713199025,
        },
        roles_admin: Deployment {
            address: address!("b1fA0Ac44d399b778B14af0AAF4bCF8af3437ad1"),
            creation_transaction_hash: b256!(
                "cfd3d8df0c20432e819623d9c230e61d81b321e6f83c8312e3ad949143d9ad7f"
            ),
            creation_block_number: 13204846,
            creation_timestamp: 1713199039,
        },
    },
    ChainDeployment {
        chain_id: BERACHAIN_CHAIN_ID,
        kernel: Deployment {
            address: address!("623164A9Ee2556D524b08f34F1d2389d7B4e1A1C"),
            creation_transaction_hash: b256!(
                "6b4e1a31a0b528ccb915aaf59e168b70d1952045b1136a510b4b7eb743fd316e"
            ),
            creation_block_number: 780016,
            creation_timestamp: 1738849414,
        },
        roles: Deployment {
            address: address!("22AE99D07584A2AE1af748De573c83f1B9Cdb4c0"),
            creation_transaction_hash: b256!(
                "b779cc9956dae7860fe1029a1990e2ed708a00ba5e86a6cbf6da524f7593d1ac"
            ),
            creation_block_number: 780020,
            creation_timestamp: 1738849422,
        },
        roles_admin: Deployment {
            address: address!("e37D9a2791707BBB858012d219960D5FBD190794"),
            creation_transaction_hash: b256!(
                "c08d6a98f20fab7b1d5593a7e30b456d38ad9fc1dfea796945a91581ab86f8ab"
            ),
            creation_block_number: 780026,
            creation_timestamp: 1738849434,
        },
    },
    ChainDeployment {
        chain_id: OPTIMISM_CHAIN_ID,
        kernel: Deployment {
            address: address!("18878Df23e2a36f81e820e4b47b4A40576D3159C"),
            creation_transaction_hash: b256!(
                "5a22cf89858ce51ee163fe3491129499cf692695d71d8f31a5a5b3c7bc52942c"
            ),
            creation_block_number: 98531655,
            creation_timestamp: 1684171967,
        },
        roles: Deployment {
            address: address!("bC9eE0D911739cBc72cd094ADA26F56E0C49EeAE"),
            creation_transaction_hash: b256!(
                "e079fa214a3da0b608ced55979292dad2b9b8a26e698baf5dac833f6c6583c1b"
            ),
            creation_block_number: 98531689,
            creation_timestamp: 1684171982,
        },
        roles_admin: Deployment {
            address: address!("b1fA0Ac44d399b778B14af0AAF4bCF8af3437ad1"),
            creation_transaction_hash: b256!(
                "673a89088e38332f8954eb446ccf8b3c384c7d2a6ef599c2fd2469f71fac4fa8"
            ),
            creation_block_number: 98531717,
            creation_timestamp: 1684171982,
        },
    },
    // sepolia creation timestamps are not on record, zero is read back from the block header
    ChainDeployment {
        chain_id: SEPOLIA_CHAIN_ID,
        kernel: Deployment {
            address: address!("4b0BBa51cE44175a9766f7e55e3d122a9F4BE78E"),
            creation_transaction_hash: b256!(
                "18bbcccdbb5c459f853f79aaab76f53fd6491792b497ec44aede68b18c0da36b"
            ),
            creation_block_number: 8226369,
            creation_timestamp: 0,
        },
        roles: Deployment {
            address: address!("EdD6ebFFeD7D29947957d096dd55e82F523ceb86"),
            creation_transaction_hash: b256!(
                "e7b168d42c2985545e28d45f0188a22be58146ec89cad28cb02efeeefe000ce8"
            ),
            creation_block_number: 8226371,
            creation_timestamp: 0,
        },
        roles_admin: Deployment {
            address: address!("f33133E5356B9534e794468dAcD424D11007f1cF"),
            creation_transaction_hash: b256!(
                "a9c9f06211b1d471edcd4a0c3ccf621a2396ecc948b5577e854fa0d80cba3327"
            ),
            creation_block_number: 8226374,
            creation_timestamp: 0,
        },
    },
];

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ETHEREUM_MAINNET_CHAIN_ID; "mainnet")]
    #[test_case(OPTIMISM_CHAIN_ID; "optimism")]
    #[test_case(BASE_CHAIN_ID; "base")]
    #[test_case(ARBITRUM_CHAIN_ID; "arbitrum")]
    #[test_case(BERACHAIN_CHAIN_ID; "berachain")]
    #[test_case(SEPOLIA_CHAIN_ID; "sepolia")]
    fn test_supported_chains_have_deployments(chain_id: ChainId) {
        let deployment = ChainDeployment::for_chain(chain_id).unwrap();
        assert_eq!(deployment.chain_id, chain_id);
        assert_eq!(deployment.start_block(), deployment.kernel.creation_block_number);
    }

    #[test]
    fn test_unsupported_chain() {
        assert_eq!(
            ChainDeployment::for_chain(143).unwrap_err(),
            ChainConfigError::UnsupportedChainId(143)
        );
        assert!(default_explorer_url(143).is_err());
    }

    #[test]
    fn test_every_supported_chain_has_explorer() {
        for chain_id in SUPPORTED_CHAIN_IDS {
            assert!(default_explorer_url(chain_id).is_ok());
        }
        assert_eq!(
            default_explorer_url(BASE_CHAIN_ID).unwrap(),
            "https://api.basescan.org/api"
        );
    }

    #[test]
    fn test_genesis_log_uses_creation_coordinates() {
        let deployment = ChainDeployment::for_chain(ETHEREUM_MAINNET_CHAIN_ID).unwrap();
        let log = deployment.kernel.genesis_log(ETHEREUM_MAINNET_CHAIN_ID);
        assert_eq!(log.block_number, 15998125);
        assert_eq!(log.log_index, 0);
        assert_eq!(
            log.transaction_hash,
            deployment.kernel.creation_transaction_hash
        );
    }
}
