//! Shared test utilities and arbitrary generators for property-based testing.

use proptest::prelude::*;

use crate::store::CounterStore;
use crate::types::{CommandName, DigramKey, ModeName};

pub fn arb_command_name() -> impl Strategy<Value = CommandName> {
    "[a-z][a-z0-9-]{0,11}".prop_map(|s| CommandName::parse(s).unwrap())
}

pub fn arb_mode_name() -> impl Strategy<Value = ModeName> {
    "[a-z][a-z-]{0,7}-mode".prop_map(|s| ModeName::parse(s).unwrap())
}

pub fn arb_digram_key() -> impl Strategy<Value = DigramKey> {
    (arb_mode_name(), arb_command_name(), arb_command_name())
        .prop_map(|(mode, predecessor, command)| DigramKey::new(mode, predecessor, command))
}

pub fn arb_counter_store() -> impl Strategy<Value = CounterStore<DigramKey>> {
    prop::collection::hash_map(arb_digram_key(), 1u64..500, 0..12)
        .prop_map(|entries| entries.into_iter().collect())
}
