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

use parking_lot::Mutex;
use slab::Slab;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use super::Value;

/// The outcome of a deferred value settling: fulfilled with a value or
/// rejected with a reason.
pub type Settled = Result<Value, Value>;

const PENDING: u8 = 0;
const FULFILLED: u8 = 1;
const REJECTED: u8 = 2;

struct Inner {
    flag: AtomicU8,
    guarded: Mutex<Guarded>,
}

struct Guarded {
    waiters: Slab<Waker>,
    outcome: Option<Settled>,
}

/// A value whose payload arrives later. Clones share the same settlement
/// state; the paired [`Completer`] settles it exactly once.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<Inner>,
}

/// The write half of a deferred value. Dropping it without settling rejects
/// the deferred with an abandonment error.
pub struct Completer {
    inner: Option<Arc<Inner>>,
}

impl Deferred {
    /// Create an unsettled deferred and the handle that settles it.
    pub fn new() -> (Deferred, Completer) {
        let inner = Arc::new(Inner {
            flag: AtomicU8::new(PENDING),
            guarded: Mutex::new(Guarded {
                waiters: Slab::new(),
                outcome: None,
            }),
        });
        (
            Deferred {
                inner: inner.clone(),
            },
            Completer { inner: Some(inner) },
        )
    }

    /// Create a deferred that is already fulfilled.
    pub fn fulfilled(value: Value) -> Deferred {
        let (deferred, completer) = Deferred::new();
        completer.fulfill(value);
        deferred
    }

    /// Create a deferred that is already rejected.
    pub fn rejected(reason: Value) -> Deferred {
        let (deferred, completer) = Deferred::new();
        completer.reject(reason);
        deferred
    }

    /// A future that resolves with the outcome once the deferred settles.
    pub fn settled(&self) -> Settlement {
        Settlement {
            inner: self.inner.clone(),
            slot: None,
        }
    }

    /// The outcome, if the deferred has already settled.
    pub fn try_settled(&self) -> Option<Settled> {
        if self.inner.flag.load(Ordering::Acquire) == PENDING {
            None
        } else {
            self.inner.guarded.lock().outcome.clone()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire) == PENDING
    }

    /// Determine whether two handles stand for the same deferred.
    pub fn same(this: &Deferred, that: &Deferred) -> bool {
        Arc::ptr_eq(&this.inner, &that.inner)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Debug for Deferred {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.flag.load(Ordering::Acquire) {
            PENDING => "pending",
            FULFILLED => "fulfilled",
            _ => "rejected",
        };
        write!(f, "Deferred({})", state)
    }
}

impl Completer {
    pub fn fulfill(mut self, value: Value) {
        self.settle(Ok(value));
    }

    pub fn reject(mut self, reason: Value) {
        self.settle(Err(reason));
    }

    fn settle(&mut self, outcome: Settled) {
        if let Some(inner) = self.inner.take() {
            settle_inner(&inner, outcome);
        }
    }
}

impl Debug for Completer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Completer({})", if self.inner.is_some() { "live" } else { "spent" })
    }
}

fn settle_inner(inner: &Arc<Inner>, outcome: Settled) {
    let flag = if outcome.is_ok() { FULFILLED } else { REJECTED };
    let mut lock = inner.guarded.lock();
    lock.outcome = Some(outcome);
    inner.flag.store(flag, Ordering::Release);
    for waker in std::mem::take(&mut lock.waiters).drain() {
        waker.wake();
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            settle_inner(
                &inner,
                Err(Value::error(
                    "AbandonedCompleter",
                    "completer was dropped before the deferred value was settled",
                )),
            );
        }
    }
}

/// Future returned by [`Deferred::settled`].
pub struct Settlement {
    inner: Arc<Inner>,
    slot: Option<usize>,
}

impl Future for Settlement {
    type Output = Settled;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Settlement { inner, slot } = self.get_mut();
        if inner.flag.load(Ordering::Acquire) == PENDING {
            let mut lock = inner.guarded.lock();
            match inner.flag.load(Ordering::Acquire) {
                PENDING => {
                    if let Some(waker) = slot.and_then(|i| lock.waiters.get_mut(i)) {
                        if !waker.will_wake(cx.waker()) {
                            *waker = cx.waker().clone();
                        }
                    } else {
                        *slot = Some(lock.waiters.insert(cx.waker().clone()));
                    }
                    Poll::Pending
                }
                _ => match &lock.outcome {
                    Some(outcome) => Poll::Ready(outcome.clone()),
                    None => Poll::Pending,
                },
            }
        } else {
            match &inner.guarded.lock().outcome {
                Some(outcome) => Poll::Ready(outcome.clone()),
                None => Poll::Pending,
            }
        }
    }
}
