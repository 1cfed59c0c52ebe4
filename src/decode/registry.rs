// Copyright 2015-2024 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{BTreeMap, HashMap};

use crate::model::deferred::{Completer, Deferred};
use crate::model::Value;

/// Decoder-side registry of deferred placeholders. Handles are retained for
/// the lifetime of the stream so every frame that cites an id observes the
/// same placeholder; completers are consumed when the id settles.
#[derive(Default)]
pub(crate) struct DecodeRegistry {
    handles: HashMap<u64, Deferred>,
    pending: BTreeMap<u64, Completer>,
}

impl DecodeRegistry {
    /// The placeholder for an id, creating it on first sight.
    pub(crate) fn placeholder(&mut self, id: u64) -> Deferred {
        if let Some(existing) = self.handles.get(&id) {
            return existing.clone();
        }
        let (deferred, completer) = Deferred::new();
        self.handles.insert(id, deferred.clone());
        self.pending.insert(id, completer);
        deferred
    }

    /// Take the completer for an id, if it is still pending.
    pub(crate) fn settle(&mut self, id: u64) -> Option<Completer> {
        self.pending.remove(&id)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reject every pending placeholder, in ascending id order.
    pub(crate) fn reject_all<F: Fn() -> Value>(&mut self, reason: F) {
        for (_, completer) in std::mem::take(&mut self.pending) {
            completer.reject(reason());
        }
    }
}
