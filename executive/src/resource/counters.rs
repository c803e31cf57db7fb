//! Generic counters
//!
//! A flat namespace of named 32-bit counters available to any
//! application, with a small fixed capacity.

use alloc::string::String;

use super::{ResourceId, SlotTable};
use crate::error::{ExecError, ExecResult};

/// One generic counter record.
#[derive(Debug, Clone, Default)]
pub struct CounterRecord {
    pub name: String,
    pub value: u32,
}

impl SlotTable<CounterRecord> {
    /// Register a counter under `name`, starting at zero.
    pub fn register_counter(&mut self, name: &str) -> ExecResult<ResourceId> {
        if name.is_empty() || name.len() > crate::config::MAX_APP_NAME_LEN {
            return Err(ExecError::BadArgument);
        }
        let id = self.reserve()?;
        let record = self.locate_mut(id).ok_or(ExecError::NotFound)?;
        record.name = String::from(name);
        record.value = 0;
        Ok(id)
    }

    /// Remove a counter.
    pub fn delete_counter(&mut self, id: ResourceId) -> ExecResult<()> {
        self.release(id)
    }

    /// Add one to a counter.
    pub fn increment_counter(&mut self, id: ResourceId) -> ExecResult<u32> {
        let record = self.locate_mut(id).ok_or(ExecError::NotFound)?;
        record.value = record.value.wrapping_add(1);
        Ok(record.value)
    }

    /// Set a counter to `value`.
    pub fn set_counter(&mut self, id: ResourceId, value: u32) -> ExecResult<()> {
        let record = self.locate_mut(id).ok_or(ExecError::NotFound)?;
        record.value = value;
        Ok(())
    }

    /// Current value of a counter.
    pub fn counter_value(&self, id: ResourceId) -> ExecResult<u32> {
        self.locate(id).map(|r| r.value).ok_or(ExecError::NotFound)
    }

    /// Id of the first counter registered under `name`.
    pub fn counter_by_name(&self, name: &str) -> ExecResult<ResourceId> {
        self.iter_used()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| id)
            .ok_or(ExecError::NotFound)
    }
}
