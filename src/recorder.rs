//! Turns the host's raw command notifications into digram counts.
//!
//! The recorder is a two-state machine: either it holds the last
//! qualifying command as a pending antecedent, or it holds nothing.
//! A named, non-excluded command E observed with antecedent A adds one
//! to the `(mode, A, E)` counter, except when E repeats A. Exclusion
//! and self-repeat are handled asymmetrically on purpose: an excluded
//! command severs the chain entirely, while a self-repeat merely skips
//! the count and carries on anchoring.

use crate::config::ExclusionList;
use crate::store::CounterStore;
use crate::types::{CommandName, DigramKey, ModeName};

pub struct EventRecorder {
    excluded: ExclusionList,
    pending: Option<CommandName>,
}

impl EventRecorder {
    pub fn new(excluded: ExclusionList) -> Self {
        EventRecorder {
            excluded,
            pending: None,
        }
    }

    /// The antecedent the next qualifying command will pair with.
    pub fn pending(&self) -> Option<&CommandName> {
        self.pending.as_ref()
    }

    /// Feeds one command notification into the store.
    ///
    /// `command` is `None` for anonymous commands (say, a closure bound
    /// straight to a key); those are invisible to the digram model and
    /// do not disturb the pending antecedent, so a named pair separated
    /// only by anonymous invocations still counts.
    pub fn observe(
        &mut self,
        store: &mut CounterStore<DigramKey>,
        mode: &ModeName,
        command: Option<&CommandName>,
    ) {
        let Some(command) = command else {
            return;
        };
        if self.excluded.contains(command) {
            // Excluded commands sever the chain in both directions:
            // they close no digram and must not anchor the next one.
            self.pending = None;
            return;
        }
        if let Some(antecedent) = &self.pending {
            if antecedent != command {
                store.increment(DigramKey::new(
                    mode.clone(),
                    antecedent.clone(),
                    command.clone(),
                ));
            }
        }
        self.pending = Some(command.clone());
    }
}
