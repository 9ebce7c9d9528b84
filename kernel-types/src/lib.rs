pub use self::{
    action::{ActionKind, ContractKind, KernelAction, ParseEnumError, UnknownActionCode},
    function::{FunctionDetails, PolicyPermission, Selector, ROLES_ADMIN_ROLE},
    keycode::{decode_padded_ascii, Keycode},
    position::{ChainId, EventPosition, LogMeta},
    records::{
        ActionExecutedRecord, ContractEventRecord, ContractRecord, KernelExecutorEventRecord,
        KernelExecutorRecord, RoleAssignmentRecord, RoleEventRecord, RoleRecord,
    },
};

mod action;
mod function;
mod keycode;
mod position;
mod records;
