use kernel_types::{
    ActionExecutedRecord, ContractEventRecord, ContractRecord, KernelExecutorEventRecord,
    KernelExecutorRecord, RoleAssignmentRecord, RoleEventRecord, RoleRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    ActionExecuted(ActionExecutedRecord),
    ContractEvent(ContractEventRecord),
    Contract(ContractRecord),
    KernelExecutorEvent(KernelExecutorEventRecord),
    KernelExecutor(KernelExecutorRecord),
    RoleEvent(RoleEventRecord),
    RoleAssignment(RoleAssignmentRecord),
    Role(RoleRecord),
}

impl WriteOp {
    pub fn table(&self) -> &'static str {
        match self {
            WriteOp::ActionExecuted(_) => "action_executed_events",
            WriteOp::ContractEvent(_) => "contract_events",
            WriteOp::Contract(_) => "contracts",
            WriteOp::KernelExecutorEvent(_) => "kernel_executor_events",
            WriteOp::KernelExecutor(_) => "kernel_executors",
            WriteOp::RoleEvent(_) => "role_events",
            WriteOp::RoleAssignment(_) => "role_assignments",
            WriteOp::Role(_) => "roles",
        }
    }
}

/// Writes derived from one event, applied atomically in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn action_executed(&mut self, record: ActionExecutedRecord) -> &mut Self {
        self.push(WriteOp::ActionExecuted(record))
    }

    /// History row plus the current row it leaves behind.
    pub fn contract_event(&mut self, record: ContractEventRecord) -> &mut Self {
        let current = record.current();
        self.push(WriteOp::ContractEvent(record));
        self.push(WriteOp::Contract(current))
    }

    /// Current row with no history row behind it.
    pub fn contract(&mut self, record: ContractRecord) -> &mut Self {
        self.push(WriteOp::Contract(record))
    }

    pub fn kernel_executor_event(&mut self, record: KernelExecutorEventRecord) -> &mut Self {
        let current = record.current();
        self.push(WriteOp::KernelExecutorEvent(record));
        self.push(WriteOp::KernelExecutor(current))
    }

    /// History row, the assignment it leaves behind, and the role itself for
    /// grants.
    pub fn role_event(&mut self, record: RoleEventRecord) -> &mut Self {
        let assignment = record.assignment();
        if record.is_granted {
            self.push(WriteOp::Role(RoleRecord {
                chain_id: record.log.chain_id,
                role: record.role.clone(),
            }));
        }
        self.push(WriteOp::RoleEvent(record));
        self.push(WriteOp::RoleAssignment(assignment))
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteSet {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
