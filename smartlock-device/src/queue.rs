//! Deferred work handed from the transport callbacks to the polling step

use std::collections::VecDeque;
use std::mem;

use smartlock_proto::Command;

/// Work that must not run in the transport's callback context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTask {
    /// Fetch key material from the issuer and store it
    FetchAndStoreKey,
    /// Verify a candidate public key and unlock on success
    VerifyAndDecide { public_key_base64: String },
    /// Lock the door
    Lock,
}

impl PendingTask {
    /// Task requested by a classified message, if any
    pub fn from_command(command: &Command) -> Option<Self> {
        match command {
            Command::Lock => Some(PendingTask::Lock),
            Command::UnlockRequest { public_key_base64 }
            | Command::ProvisionEnvelope { public_key_base64 } => {
                Some(PendingTask::VerifyAndDecide {
                    public_key_base64: public_key_base64.clone(),
                })
            }
            Command::Unrecognized => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PendingTask::FetchAndStoreKey => "fetch-and-store-key",
            PendingTask::VerifyAndDecide { .. } => "verify-and-decide",
            PendingTask::Lock => "lock",
        }
    }
}

/// At most one task per kind
///
/// A newer task of a queued kind drops the older one and joins at the back,
/// so tasks drain in the order their messages completed.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<PendingTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task`; returns true when it replaced a task of the same kind
    pub fn push(&mut self, task: PendingTask) -> bool {
        let kind = mem::discriminant(&task);
        let replaced = match self.tasks.iter().position(|t| mem::discriminant(t) == kind) {
            Some(index) => self.tasks.remove(index).is_some(),
            None => false,
        };
        self.tasks.push_back(task);
        replaced
    }

    pub fn pop(&mut self) -> Option<PendingTask> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
