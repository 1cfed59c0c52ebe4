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
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::model::Value;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const DISARMED: u8 = 2;

#[derive(Debug)]
struct Inner {
    flag: AtomicU8,
    guarded: Mutex<Guarded>,
}

#[derive(Debug)]
struct Guarded {
    waiters: Slab<Waker>,
    reason: Option<Value>,
}

/// Create a one-to-many cancellation signal. Firing the handle resolves every
/// copy of the signal with the supplied reason. Dropping the handle without
/// firing leaves the signal pending forever; it never cancels spuriously.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let inner = Arc::new(Inner {
        flag: AtomicU8::new(ARMED),
        guarded: Mutex::new(Guarded {
            waiters: Slab::new(),
            reason: None,
        }),
    });
    (
        CancelHandle {
            inner: Some(inner.clone()),
        },
        CancelSignal { inner, slot: None },
    )
}

/// The firing half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    inner: Option<Arc<Inner>>,
}

impl CancelHandle {
    /// Fire the signal with a reason, waking every copy of the signal.
    pub fn cancel(mut self, reason: Value) {
        if let Some(inner) = self.inner.take() {
            let mut lock = inner.guarded.lock();
            lock.reason = Some(reason);
            inner.flag.store(FIRED, Ordering::Release);
            for waker in std::mem::take(&mut lock.waiters).drain() {
                waker.wake();
            }
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.flag.store(DISARMED, Ordering::Release);
        }
    }
}

/// The observing half of a cancellation signal: a cloneable future that
/// resolves with the cancellation reason.
#[derive(Debug)]
pub struct CancelSignal {
    inner: Arc<Inner>,
    slot: Option<usize>,
}

impl Clone for CancelSignal {
    fn clone(&self) -> Self {
        CancelSignal {
            inner: self.inner.clone(),
            slot: None,
        }
    }
}

impl CancelSignal {
    /// The reason, if the signal has already fired.
    pub fn fired(&self) -> Option<Value> {
        if self.inner.flag.load(Ordering::Acquire) == FIRED {
            self.inner.guarded.lock().reason.clone()
        } else {
            None
        }
    }
}

/// Wait on an optional signal; an absent signal never fires.
pub(crate) async fn cancelled(signal: &mut Option<CancelSignal>) -> Value {
    match signal {
        Some(signal) => signal.await,
        None => futures::future::pending().await,
    }
}

impl Future for CancelSignal {
    type Output = Value;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let CancelSignal { inner, slot } = self.get_mut();
        match inner.flag.load(Ordering::Acquire) {
            ARMED => {
                let mut lock = inner.guarded.lock();
                match inner.flag.load(Ordering::Acquire) {
                    ARMED => {
                        if let Some(waker) = slot.and_then(|i| lock.waiters.get_mut(i)) {
                            if !waker.will_wake(cx.waker()) {
                                *waker = cx.waker().clone();
                            }
                        } else {
                            *slot = Some(lock.waiters.insert(cx.waker().clone()));
                        }
                        Poll::Pending
                    }
                    FIRED => match &lock.reason {
                        Some(reason) => Poll::Ready(reason.clone()),
                        None => Poll::Pending,
                    },
                    _ => Poll::Pending,
                }
            }
            FIRED => match &inner.guarded.lock().reason {
                Some(reason) => Poll::Ready(reason.clone()),
                None => Poll::Pending,
            },
            _ => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::FutureExt;

    use super::cancellation;
    use crate::model::Value;

    #[tokio::test]
    async fn firing_resolves_every_signal() {
        let (handle, signal) = cancellation();
        let other = signal.clone();
        handle.cancel(Value::text("stop"));
        assert_eq!(signal.await, Value::text("stop"));
        assert_eq!(other.await, Value::text("stop"));
    }

    #[test]
    fn fired_reports_reason() {
        let (handle, signal) = cancellation();
        assert!(signal.fired().is_none());
        handle.cancel(Value::Null);
        assert_eq!(signal.fired(), Some(Value::Null));
    }

    #[test]
    fn dropping_the_handle_never_fires() {
        let (handle, mut signal) = cancellation();
        drop(handle);
        assert!(signal.fired().is_none());
        assert!((&mut signal).now_or_never().is_none());
    }
}
