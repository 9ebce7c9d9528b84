//! Read-only contract calls, pinned to the block of the event being processed.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes};
use alloy_rpc_client::{ClientBuilder, ReqwestClient};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use eyre::Context;
use kernel_types::{Keycode, Selector};
use thiserror::Error;
use tracing::trace;

use crate::abi::{IKernel, IModule, IPolicy, IRolesAdmin};

#[derive(Debug, Error)]
#[error("{call} on {address} at block {block} failed: {reason}")]
pub struct ChainReadError {
    pub call: &'static str,
    pub address: Address,
    pub block: u64,
    pub reason: String,
}

pub trait ChainReader {
    /// `KEYCODE()` of a module.
    async fn module_keycode(&self, module: Address, block: u64)
        -> Result<Keycode, ChainReadError>;

    /// `requestPermissions()` of a policy as `(keycode, selector)` pairs.
    async fn policy_permissions(
        &self,
        policy: Address,
        block: u64,
    ) -> Result<Vec<(Keycode, Selector)>, ChainReadError>;

    async fn kernel_executor(&self, kernel: Address, block: u64)
        -> Result<Address, ChainReadError>;

    async fn roles_admin_admin(
        &self,
        roles_admin: Address,
        block: u64,
    ) -> Result<Address, ChainReadError>;
}

/// [`ChainReader`] over JSON-RPC `eth_call`.
#[derive(Clone)]
pub struct RpcChainReader {
    client: ReqwestClient,
}

impl RpcChainReader {
    pub fn new(rpc_url: &str) -> eyre::Result<Self> {
        let url = url::Url::from_str(rpc_url).wrap_err("invalid rpc url")?;
        Ok(Self {
            client: ClientBuilder::default().http(url),
        })
    }

    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }

    async fn call<C: SolCall>(
        &self,
        to: Address,
        call: C,
        block: u64,
    ) -> Result<C::Return, ChainReadError> {
        let error = |reason: String| ChainReadError {
            call: C::SIGNATURE,
            address: to,
            block,
            reason,
        };

        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(call.abi_encode().into()));
        let output: Bytes = self
            .client
            .request("eth_call", (request, format!("{block:#x}")))
            .await
            .map_err(|err| error(err.to_string()))?;
        trace!(call = C::SIGNATURE, %to, block, len = output.len(), "eth_call");

        C::abi_decode_returns(&output, true).map_err(|err| error(err.to_string()))
    }
}

impl ChainReader for RpcChainReader {
    async fn module_keycode(
        &self,
        module: Address,
        block: u64,
    ) -> Result<Keycode, ChainReadError> {
        let ret = self.call(module, IModule::KEYCODECall {}, block).await?;
        Ok(Keycode::from_bytes(ret.keycode_.as_slice()))
    }

    async fn policy_permissions(
        &self,
        policy: Address,
        block: u64,
    ) -> Result<Vec<(Keycode, Selector)>, ChainReadError> {
        let ret = self
            .call(policy, IPolicy::requestPermissionsCall {}, block)
            .await?;
        Ok(ret
            .requests
            .into_iter()
            .map(|p| (Keycode::from_bytes(p.keycode.as_slice()), p.funcSelector))
            .collect())
    }

    async fn kernel_executor(
        &self,
        kernel: Address,
        block: u64,
    ) -> Result<Address, ChainReadError> {
        let ret = self.call(kernel, IKernel::executorCall {}, block).await?;
        Ok(ret.executor_)
    }

    async fn roles_admin_admin(
        &self,
        roles_admin: Address,
        block: u64,
    ) -> Result<Address, ChainReadError> {
        let ret = self.call(roles_admin, IRolesAdmin::adminCall {}, block).await?;
        Ok(ret.admin_)
    }
}
