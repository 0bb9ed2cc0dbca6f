// src/realtime/local.rs — In-process realtime gateway
//
// Keeps calls and channels in memory. Used for local development and by the
// test suite, which relies on the failure injection hooks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RealtimeError, RealtimeGateway, RealtimeResource};
use crate::session::types::CallMetadata;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalCall {
    pub owner: String,
    pub metadata: CallMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalChannel {
    pub name: String,
    pub owner: String,
    pub members: Vec<String>,
}

/// Gateway operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalOp {
    CreateCall,
    DeleteCall,
    CreateChannel,
    AddMember,
    DeleteChannel,
}

#[derive(Default)]
struct LocalState {
    calls: HashMap<String, LocalCall>,
    channels: HashMap<String, LocalChannel>,
    /// Remaining injected failures per op; `u32::MAX` means always.
    failures: HashMap<LocalOp, u32>,
    invocations: HashMap<LocalOp, u32>,
}

#[derive(Default)]
pub struct LocalGateway {
    state: Mutex<LocalState>,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `times` invocations of `op` fail as unavailable.
    pub fn fail_next(&self, op: LocalOp, times: u32) {
        self.lock().failures.insert(op, times);
    }

    /// Make every invocation of `op` fail until `clear_failures`.
    pub fn fail_always(&self, op: LocalOp) {
        self.lock().failures.insert(op, u32::MAX);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn call(&self, call_id: &str) -> Option<LocalCall> {
        self.lock().calls.get(call_id).cloned()
    }

    pub fn channel(&self, call_id: &str) -> Option<LocalChannel> {
        self.lock().channels.get(call_id).cloned()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// How many times `op` was invoked, including failed attempts.
    pub fn invocations(&self, op: LocalOp) -> u32 {
        self.lock().invocations.get(&op).copied().unwrap_or(0)
    }

    /// Record the invocation and consume an injected failure if one is armed.
    fn begin(&self, op: LocalOp) -> Result<MutexGuard<'_, LocalState>, RealtimeError> {
        let mut state = self.lock();
        *state.invocations.entry(op).or_insert(0) += 1;

        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(RealtimeError::Unavailable {
                    message: format!("injected failure for {op:?}"),
                });
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl RealtimeGateway for LocalGateway {
    fn id(&self) -> &str {
        "local"
    }

    async fn create_or_get_call(
        &self,
        call_id: &str,
        owner_provider_id: &str,
        metadata: &CallMetadata,
    ) -> Result<(), RealtimeError> {
        let mut state = self.begin(LocalOp::CreateCall)?;
        state
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| LocalCall {
                owner: owner_provider_id.to_string(),
                metadata: metadata.clone(),
            });
        Ok(())
    }

    async fn delete_call(&self, call_id: &str, _hard: bool) -> Result<(), RealtimeError> {
        let mut state = self.begin(LocalOp::DeleteCall)?;
        match state.calls.remove(call_id) {
            Some(_) => Ok(()),
            None => Err(RealtimeError::NotFound {
                resource: RealtimeResource::Call,
                id: call_id.to_string(),
            }),
        }
    }

    async fn create_channel(
        &self,
        call_id: &str,
        name: &str,
        owner_provider_id: &str,
        initial_members: &[String],
    ) -> Result<(), RealtimeError> {
        let mut state = self.begin(LocalOp::CreateChannel)?;
        let channel = state
            .channels
            .entry(call_id.to_string())
            .or_insert_with(|| LocalChannel {
                name: name.to_string(),
                owner: owner_provider_id.to_string(),
                members: Vec::new(),
            });
        for member in initial_members {
            if !channel.members.contains(member) {
                channel.members.push(member.clone());
            }
        }
        Ok(())
    }

    async fn add_channel_member(
        &self,
        call_id: &str,
        provider_id: &str,
    ) -> Result<(), RealtimeError> {
        let mut state = self.begin(LocalOp::AddMember)?;
        let channel = state
            .channels
            .get_mut(call_id)
            .ok_or_else(|| RealtimeError::NotFound {
                resource: RealtimeResource::Channel,
                id: call_id.to_string(),
            })?;
        if !channel.members.iter().any(|m| m == provider_id) {
            channel.members.push(provider_id.to_string());
        }
        Ok(())
    }

    async fn delete_channel(&self, call_id: &str) -> Result<(), RealtimeError> {
        let mut state = self.begin(LocalOp::DeleteChannel)?;
        match state.channels.remove(call_id) {
            Some(_) => Ok(()),
            None => Err(RealtimeError::NotFound {
                resource: RealtimeResource::Channel,
                id: call_id.to_string(),
            }),
        }
    }
}
