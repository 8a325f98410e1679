//! Paint Fence Coordinator
//!
//! Correlates a `fence-request{token}` with the guest's `fence-ack{token}`. The
//! guest acknowledges on its next frame boundary, so a resolved fence means the
//! guest DOM already reflects every change sent before the request.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Monotonic per-instance fence identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceToken(u64);

impl FenceToken {
    pub fn new(raw: u64) -> Self {
        FenceToken(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

struct Pending {
    token: FenceToken,
    resolver: oneshot::Sender<()>,
}

struct FenceState {
    last_token: u64,
    pending: Option<Pending>,
}

/// Mints tokens and holds the single outstanding resolver.
pub struct PaintFence {
    state: Mutex<FenceState>,
}

impl Default for PaintFence {
    fn default() -> Self {
        Self::new()
    }
}

impl PaintFence {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FenceState {
                last_token: 0,
                pending: None,
            }),
        }
    }

    /// Mint a token and make it the only pending fence. Any earlier unresolved
    /// fence is abandoned; its [`FenceWait`] never completes.
    pub fn begin(&self) -> (FenceToken, FenceWait) {
        let (resolver, receiver) = oneshot::channel();
        let mut state = self.state.lock();
        state.last_token += 1;
        let token = FenceToken(state.last_token);
        state.pending = Some(Pending { token, resolver });
        (token, FenceWait::pending(receiver))
    }

    /// Resolve the pending fence if `token` matches it. Stale or unknown tokens
    /// are ignored and return `false`.
    pub fn resolve(&self, token: FenceToken) -> bool {
        let mut state = self.state.lock();
        match state.pending.take() {
            Some(pending) if pending.token == token => {
                // The waiter may have been dropped; that is not an error.
                let _ = pending.resolver.send(());
                true
            }
            other => {
                state.pending = other;
                false
            }
        }
    }

    /// Drop the pending fence without waking its waiter.
    pub fn abandon(&self) {
        self.state.lock().pending = None;
    }

    pub fn pending_token(&self) -> Option<FenceToken> {
        self.state.lock().pending.as_ref().map(|p| p.token)
    }
}

/// Future returned by `await_paint`.
///
/// Completes when the matching acknowledgment arrives, or immediately if there
/// was no connected guest. A superseded or abandoned fence stays pending
/// forever; wrap it in a timeout if a bound is needed.
pub struct FenceWait {
    inner: WaitInner,
}

enum WaitInner {
    Ready,
    Pending(oneshot::Receiver<()>),
    Abandoned,
}

impl FenceWait {
    pub fn ready() -> Self {
        Self {
            inner: WaitInner::Ready,
        }
    }

    fn pending(receiver: oneshot::Receiver<()>) -> Self {
        Self {
            inner: WaitInner::Pending(receiver),
        }
    }

    /// Whether this wait resolved without a round trip.
    pub fn is_immediate(&self) -> bool {
        matches!(self.inner, WaitInner::Ready)
    }
}

impl Future for FenceWait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match &mut self.inner {
            WaitInner::Ready => Poll::Ready(()),
            WaitInner::Abandoned => Poll::Pending,
            WaitInner::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(())) => {
                    self.inner = WaitInner::Ready;
                    Poll::Ready(())
                }
                Poll::Ready(Err(_)) => {
                    self.inner = WaitInner::Abandoned;
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
