use alloy_primitives::FixedBytes;
use serde::{Deserialize, Serialize};

/// 4-byte function selector.
pub type Selector = FixedBytes<4>;

/// Role granted to whoever holds the admin seat of the roles-admin contract.
/// It has no on-chain grant/revoke events; transfers are tracked through
/// `NewAdminPulled`.
pub const ROLES_ADMIN_ROLE: &str = "RolesAdmin";

/// A contract function with the roles its guard requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDetails {
    /// Bare function name, e.g. `transfer`
    pub name: String,
    pub selector: Selector,
    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub signature: String,
    pub roles: Vec<String>,
}

/// A module function a policy is permitted to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPermission {
    pub keycode: String,
    /// Readable signature, or the raw selector hex when it could not be resolved
    pub function: String,
}
