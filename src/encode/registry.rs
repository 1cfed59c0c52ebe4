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

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::collections::{BTreeSet, HashMap};

use crate::error::EncodeError;
use crate::model::deferred::{Deferred, Settled};

/// Encoder-side registry of deferred values. Ids are assigned by identity in
/// a single space shared by all frames of the stream; each registered
/// deferred is observed until it settles.
#[derive(Default)]
pub(crate) struct EncodeRegistry {
    ids: HashMap<usize, u64>,
    outstanding: BTreeSet<u64>,
    settlements: FuturesUnordered<BoxFuture<'static, (u64, Settled)>>,
    closed: bool,
}

impl EncodeRegistry {
    /// The id for a deferred, registering it on first sight. Fails once the
    /// registry has been closed by cancellation.
    pub(crate) fn register(&mut self, deferred: &Deferred) -> Result<u64, EncodeError> {
        if let Some(&id) = self.ids.get(&deferred.identity()) {
            return Ok(id);
        }
        if self.closed {
            return Err(EncodeError::Cancelled);
        }
        let id = self.ids.len() as u64;
        self.ids.insert(deferred.identity(), id);
        self.outstanding.insert(id);
        let settlement = deferred.settled();
        self.settlements
            .push(async move { (id, settlement.await) }.boxed());
        Ok(id)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// The next deferred to settle, in completion order.
    pub(crate) async fn next_settlement(&mut self) -> Option<(u64, Settled)> {
        self.settlements.next().await
    }

    pub(crate) fn complete(&mut self, id: u64) {
        self.outstanding.remove(&id);
    }

    /// Stop accepting registrations and drain the ids that are still
    /// outstanding, in ascending order.
    pub(crate) fn close(&mut self) -> Vec<u64> {
        self.closed = true;
        std::mem::take(&mut self.outstanding).into_iter().collect()
    }
}
