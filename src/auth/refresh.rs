//! Single-flight access-token refresh.
//!
//! Any number of requests may fail with 401 at once. The first one starts a
//! refresh, the rest queue behind it, and once the refresh settles every
//! queued request is either replayed with the new token or rejected with the
//! same error.

use crate::auth::{AuthEvent, SessionEvents, TokenStore};
use crate::errors::{TransportError, TransportResult};
use crate::transport::{RequestDescriptor, ResponseEnvelope};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Notify};
use tracing::{debug, info, warn};

/// Re-sends a request after the token has been refreshed.
#[async_trait]
pub trait RequestReplayer: Send + Sync {
    async fn replay(&self, request: RequestDescriptor) -> TransportResult<ResponseEnvelope>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    /// A refresh is in flight; 401s are queued
    Refreshing,
    /// The refresh succeeded and queued requests are being replayed
    Draining,
}

enum Pending {
    Replay {
        request: RequestDescriptor,
        replayer: Arc<dyn RequestReplayer>,
        reply: oneshot::Sender<TransportResult<ResponseEnvelope>>,
    },
    Waiter {
        reply: oneshot::Sender<TransportResult<()>>,
    },
}

impl Pending {
    fn reject(self, error: TransportError) {
        match self {
            Pending::Replay { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Pending::Waiter { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }

    async fn release(self) {
        match self {
            Pending::Replay {
                request,
                replayer,
                reply,
            } => {
                let result = replayer.replay(request.into_replay()).await;
                let _ = reply.send(result);
            }
            Pending::Waiter { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }
}

struct RefreshState {
    phase: RefreshPhase,
    queue: VecDeque<Pending>,
    /// Bumped on reset; a refresh started under an older generation is ignored
    generation: u64,
}

pub struct AuthRefreshCoordinator {
    store: Arc<dyn TokenStore>,
    events: SessionEvents,
    state: Mutex<RefreshState>,
    /// Wakes the drain loop when an entry is queued during `Draining`
    arrivals: Notify,
}

impl AuthRefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, events: SessionEvents) -> Self {
        Self {
            store,
            events,
            state: Mutex::new(RefreshState {
                phase: RefreshPhase::Idle,
                queue: VecDeque::new(),
                generation: 0,
            }),
            arrivals: Notify::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> RefreshPhase {
        self.state.lock().phase
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Handles a 401 for `request`.
    ///
    /// Resolves with the outcome of replaying the request once a refresh has
    /// succeeded, or with the refresh error. A 401 on a request that is
    /// itself a replay is returned unchanged.
    pub async fn handle_unauthorized(
        self: &Arc<Self>,
        request: RequestDescriptor,
        error: TransportError,
        replayer: Arc<dyn RequestReplayer>,
    ) -> TransportResult<ResponseEnvelope> {
        if request.auth_replay {
            debug!(url = %request.url, "replayed request rejected again, not refreshing");
            return Err(error);
        }

        if !self.store.supports_refresh() {
            self.events.emit_unauthorized(error.clone());
            return Err(error);
        }

        let (reply, receiver) = oneshot::channel();
        let cancellation = request.cancellation.clone();
        debug!(url = %request.url, "queueing request behind token refresh");
        self.enqueue(Pending::Replay {
            request,
            replayer,
            reply,
        });

        match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportError::CallerAborted),
                    result = receiver => result.unwrap_or_else(|_| Err(abandoned())),
                }
            }
            None => receiver.await.unwrap_or_else(|_| Err(abandoned())),
        }
    }

    /// Waits for the current refresh, starting one if none is running.
    ///
    /// Used by callers that cannot be replayed, such as streams, which
    /// re-issue the request themselves once this returns `Ok`.
    pub async fn wait_for_refresh(self: &Arc<Self>, error: TransportError) -> TransportResult<()> {
        if !self.store.supports_refresh() {
            self.events.emit_unauthorized(error.clone());
            return Err(error);
        }

        let (reply, receiver) = oneshot::channel();
        self.enqueue(Pending::Waiter { reply });
        receiver.await.unwrap_or_else(|_| Err(abandoned()))
    }

    /// Drops all queued requests (they fail with `RefreshFailed`) and makes
    /// any refresh still in flight inert. Called on logout.
    pub fn reset(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.phase = RefreshPhase::Idle;
            std::mem::take(&mut state.queue)
        };

        if !drained.is_empty() {
            info!(count = drained.len(), "session reset, rejecting queued requests");
        }
        let error = TransportError::RefreshFailed {
            message: "Session was reset".to_string(),
        };
        for entry in drained {
            entry.reject(error.clone());
        }
    }

    fn enqueue(self: &Arc<Self>, entry: Pending) {
        let start = {
            let mut state = self.state.lock();
            state.queue.push_back(entry);
            match state.phase {
                RefreshPhase::Idle => {
                    state.phase = RefreshPhase::Refreshing;
                    Some(state.generation)
                }
                RefreshPhase::Draining => {
                    self.arrivals.notify_one();
                    None
                }
                RefreshPhase::Refreshing => None,
            }
        };

        if let Some(generation) = start {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_refresh(generation).await });
        }
    }

    async fn run_refresh(self: Arc<Self>, generation: u64) {
        info!("refreshing access token");

        let token = match self.store.refresh_access_token().await {
            Ok(Some(token)) if !token.is_empty() => Ok(token),
            Ok(_) => Err(TransportError::RefreshFailed {
                message: "Refresh returned no access token".to_string(),
            }),
            Err(TransportError::RefreshFailed { message }) => {
                Err(TransportError::RefreshFailed { message })
            }
            Err(e) => Err(TransportError::RefreshFailed {
                message: e.to_string(),
            }),
        };

        match token {
            Ok(token) => {
                {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        debug!("refresh settled after reset, ignoring");
                        return;
                    }
                    self.store.store_access_token(&token);
                    state.phase = RefreshPhase::Draining;
                }
                info!("access token refreshed");
                self.drain(generation).await;
            }
            Err(error) => {
                let rejected = {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        debug!("refresh failed after reset, ignoring");
                        return;
                    }
                    state.phase = RefreshPhase::Idle;
                    std::mem::take(&mut state.queue)
                };

                warn!(count = rejected.len(), error = %error, "token refresh failed");
                self.store.clear_tokens();
                for entry in rejected {
                    entry.reject(error.clone());
                }
                self.events.emit_unauthorized(error);
            }
        }
    }

    /// Replays queued entries in FIFO start order. Each replay starts as
    /// soon as it is dequeued, so entries that arrive while earlier ones are
    /// still in flight do not wait for them. The phase returns to `Idle`
    /// once the queue is empty and no replay is running.
    async fn drain(&self, generation: u64) {
        let mut running = FuturesUnordered::new();

        loop {
            let batch = {
                let mut state = self.state.lock();
                if state.generation != generation {
                    break;
                }
                if state.queue.is_empty() && running.is_empty() {
                    state.phase = RefreshPhase::Idle;
                    return;
                }
                std::mem::take(&mut state.queue)
            };

            if !batch.is_empty() {
                debug!(count = batch.len(), "replaying queued requests");
                running.extend(batch.into_iter().map(Pending::release));
            }

            tokio::select! {
                Some(()) = running.next(), if !running.is_empty() => {}
                _ = self.arrivals.notified() => {}
            }
        }

        // reset while draining: replays already started still answer their callers
        while running.next().await.is_some() {}
    }
}

fn abandoned() -> TransportError {
    TransportError::RefreshFailed {
        message: "Token refresh was abandoned".to_string(),
    }
}
