//! Turns an explorer ABI plus verified source into per-function details.
//!
//! Role inference is textual: the function's declaration is located in the
//! flattened source and its first recognized access-control modifier decides
//! the roles. Anything unrecognized yields no roles.

use std::{collections::HashSet, sync::LazyLock};

use alloy_json_abi::JsonAbi;
use kernel_types::{FunctionDetails, Selector, ROLES_ADMIN_ROLE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Directory name of the contract whose `onlyAdmin` guards the admin seat.
pub const ROLES_ADMIN_CONTRACT: &str = "RolesAdmin";

const ADMIN_ROLE: &str = "admin";
const EMERGENCY_ROLE: &str = "emergency";

static ONLY_ROLE_CONSTANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"onlyRole\(([A-Z_][A-Z0-9_]*)\)").expect("invalid onlyRole constant pattern")
});
static ONLY_ADMIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"onlyAdmin\(\)").expect("invalid onlyAdmin pattern"));
static ONLY_EMERGENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"onlyEmergency\(\)").expect("invalid onlyEmergency pattern"));
static ONLY_ADMIN_OR_EMERGENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"onlyAdminOrEmergency\(\)").expect("invalid onlyAdminOrEmergency pattern")
});
// verified sources are often JSON-escaped, hence the optional backslashes
static ONLY_ROLE_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"onlyRole\(\\?"([^"\\]*)\\?"\)"#).expect("invalid onlyRole literal pattern")
});

/// Function data of one contract, in ABI order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub functions: Vec<FunctionDetails>,
}

impl ContractMetadata {
    pub fn function(&self, selector: Selector) -> Option<&FunctionDetails> {
        self.functions.iter().find(|f| f.selector == selector)
    }

    /// Functions behind at least one role.
    pub fn guarded_functions(&self) -> Vec<FunctionDetails> {
        self.functions
            .iter()
            .filter(|f| !f.roles.is_empty())
            .cloned()
            .collect()
    }
}

/// Collects every ABI function with its selector and canonical signature.
/// Roles are left empty.
pub fn process_abi(abi: &JsonAbi) -> ContractMetadata {
    let mut seen = HashSet::new();
    let functions = abi
        .functions()
        .filter(|function| seen.insert(function.selector()))
        .map(|function| FunctionDetails {
            name: function.name.clone(),
            selector: function.selector(),
            signature: function.signature(),
            roles: Vec::new(),
        })
        .collect();

    ContractMetadata { functions }
}

/// Fills in the roles of every function in `metadata` from `source`.
pub fn process_source(
    contract_name: &str,
    source: &str,
    mut metadata: ContractMetadata,
) -> ContractMetadata {
    for function in metadata.functions.iter_mut() {
        let Some(definition) = find_definition(source, &function.name) else {
            warn!(
                contract = contract_name,
                function = %function.name,
                "function not found in source"
            );
            continue;
        };

        if let Some(guard) = Guard::classify(definition, source) {
            function.roles = guard.roles(contract_name);
            debug!(
                contract = contract_name,
                function = %function.name,
                roles = ?function.roles,
                "found guarded function"
            );
        }
    }
    metadata
}

/// Header of `function <name>(...)` up to and including its opening brace.
fn find_definition<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!(r"function {}\s*\([^{{]*\)\s*[^{{]*\{{", regex::escape(name));
    match Regex::new(&pattern) {
        Ok(re) => re.find(source).map(|m| m.as_str()),
        Err(err) => {
            warn!(?err, function = name, "bad function pattern");
            None
        }
    }
}

/// Value of `bytes32 [visibility] constant <name> = "..."` anywhere in `source`.
fn resolve_constant(source: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#"bytes32\s+(?:(?:public|private|internal)\s+)?constant\s+{}\s*=\s*\\?"([^"\\]*)\\?""#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Access-control modifier recognized on a function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// `onlyRole(NAME)` where `NAME` is a `bytes32` constant declared in the source
    Constant { name: String, value: String },
    OnlyAdmin,
    OnlyEmergency,
    OnlyAdminOrEmergency,
    /// `onlyRole("value")`
    Literal(String),
}

impl Guard {
    /// Classifies the first guard found in `definition`, in priority order.
    /// `source` is searched for constant declarations.
    pub fn classify(definition: &str, source: &str) -> Option<Guard> {
        if let Some(name) = ONLY_ROLE_CONSTANT
            .captures(definition)
            .and_then(|caps| caps.get(1))
        {
            if let Some(value) = resolve_constant(source, name.as_str()) {
                return Some(Guard::Constant {
                    name: name.as_str().to_owned(),
                    value,
                });
            }
        }

        if ONLY_ADMIN.is_match(definition) {
            return Some(Guard::OnlyAdmin);
        }
        if ONLY_EMERGENCY.is_match(definition) {
            return Some(Guard::OnlyEmergency);
        }
        if ONLY_ADMIN_OR_EMERGENCY.is_match(definition) {
            return Some(Guard::OnlyAdminOrEmergency);
        }

        ONLY_ROLE_LITERAL
            .captures(definition)
            .and_then(|caps| caps.get(1))
            .map(|value| Guard::Literal(value.as_str().to_owned()))
    }

    pub fn roles(&self, contract_name: &str) -> Vec<String> {
        match self {
            Guard::Constant { value, .. } => vec![value.clone()],
            Guard::OnlyAdmin if contract_name == ROLES_ADMIN_CONTRACT => {
                vec![ROLES_ADMIN_ROLE.to_owned()]
            }
            Guard::OnlyAdmin => vec![ADMIN_ROLE.to_owned()],
            Guard::OnlyEmergency => vec![EMERGENCY_ROLE.to_owned()],
            Guard::OnlyAdminOrEmergency => {
                vec![ADMIN_ROLE.to_owned(), EMERGENCY_ROLE.to_owned()]
            }
            Guard::Literal(value) => vec![value.clone()],
        }
    }
}
