//! Log entry types exchanged between the apply engine and state machines.

use serde::{Deserialize, Serialize};

/// Result of applying a single command.
///
/// `value` carries a small numeric outcome (e.g. a count or status code);
/// `data` carries an application-defined payload returned to the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResult {
    pub value: u64,
    pub data: Vec<u8>,
}

impl EntryResult {
    pub fn new(value: u64, data: Vec<u8>) -> Self {
        Self { value, data }
    }

    /// Result carrying only a numeric outcome.
    pub fn value(value: u64) -> Self {
        Self {
            value,
            data: Vec::new(),
        }
    }
}

/// A committed log entry to be applied to a state machine.
///
/// Entries are handed to the apply path in index order; the machine fills
/// `result` in place and the same sequence flows back to the engine so it
/// can reply to clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Position of the entry in the replicated log.
    pub index: u64,
    /// Serialized application command.
    pub cmd: Vec<u8>,
    /// Outcome of applying `cmd`, filled during update.
    pub result: EntryResult,
}

impl Entry {
    pub fn new(index: u64, cmd: Vec<u8>) -> Self {
        Self {
            index,
            cmd,
            result: EntryResult::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_has_empty_result() {
        let entry = Entry::new(7, b"put k v".to_vec());
        assert_eq!(entry.index, 7);
        assert_eq!(entry.result, EntryResult::default());
    }

    #[test]
    fn value_result_has_no_data() {
        let result = EntryResult::value(3);
        assert_eq!(result.value, 3);
        assert!(result.data.is_empty());
    }
}
