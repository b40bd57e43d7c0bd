//! Correlated request/response bridge to the computation collaborator.
//!
//! The collaborator runs in its own execution context (worker process,
//! thread, or task) and is reached purely by message passing: requests go
//! out on an mpsc channel, responses come back on another, and the two are
//! matched by nonce. Responses may arrive in any order. Every pending
//! evaluation is bounded by a timeout so the resolver map cannot grow
//! without limit when the collaborator never replies.

use crate::context::EvalContext;
use crate::protocol::{ComputeJob, EngineRequest, EngineResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BridgeError {
  #[error("computation collaborator is no longer reachable")]
  Disconnected,
  #[error("no response for nonce {nonce} within {timeout:?}")]
  Timeout { nonce: String, timeout: Duration },
  #[error("evaluation was cancelled before a response arrived")]
  Cancelled,
}

type PendingMap = HashMap<String, oneshot::Sender<EngineResponse>>;

/// Handle to the collaborator. Constructed per session and torn down by
/// dropping it; nothing here is process-global.
pub struct EngineBridge {
  requests: mpsc::Sender<EngineRequest>,
  pending: Arc<Mutex<PendingMap>>,
  timeout: Duration,
  router: tokio::task::JoinHandle<()>,
}

impl EngineBridge {
  pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

  /// Wires the bridge to the collaborator's channels and spawns the
  /// response router. The router resolves each incoming response against
  /// the pending map; a response with an unknown nonce is logged and
  /// dropped, never escalated.
  pub fn new(
    requests: mpsc::Sender<EngineRequest>,
    mut responses: mpsc::Receiver<EngineResponse>,
    timeout: Duration,
  ) -> Self {
    let pending: Arc<Mutex<PendingMap>> = Arc::default();
    let router = tokio::spawn({
      let pending = Arc::clone(&pending);
      async move {
        while let Some(response) = responses.recv().await {
          let resolver = pending.lock().unwrap().remove(&response.nonce);
          match resolver {
            Some(tx) => {
              if tx.send(response).is_err() {
                // The caller already timed out or cancelled.
              }
            }
            None => {
              log::debug!("dropping response with unknown nonce {}", response.nonce)
            }
          }
        }
      }
    });
    EngineBridge {
      requests,
      pending,
      timeout,
      router,
    }
  }

  /// Registers a fresh nonce and sends one request. The returned handle
  /// must be awaited (or cancelled) to observe the outcome.
  pub async fn submit(
    &self,
    job: ComputeJob,
    context: &EvalContext,
  ) -> Result<InFlight, BridgeError> {
    let nonce = Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel();
    self.pending.lock().unwrap().insert(nonce.clone(), tx);
    let request = EngineRequest {
      nonce: nonce.clone(),
      evaluate: job,
      functions: context.functions(),
      variables: context.variables(),
    };
    if self.requests.send(request).await.is_err() {
      self.pending.lock().unwrap().remove(&nonce);
      return Err(BridgeError::Disconnected);
    }
    Ok(InFlight {
      nonce,
      rx,
      pending: Arc::clone(&self.pending),
      timeout: self.timeout,
    })
  }

  /// One full round trip: send, then wait for the matching response.
  pub async fn evaluate(
    &self,
    job: ComputeJob,
    context: &EvalContext,
  ) -> Result<EngineResponse, BridgeError> {
    self.submit(job, context).await?.wait().await
  }

  /// Number of evaluations still awaiting a response.
  pub fn pending_count(&self) -> usize {
    self.pending.lock().unwrap().len()
  }
}

impl Drop for EngineBridge {
  fn drop(&mut self) {
    self.router.abort();
  }
}

/// One outstanding evaluation. Dropping it without waiting evicts the
/// pending resolver, so an abandoned call cannot leak.
pub struct InFlight {
  nonce: String,
  rx: oneshot::Receiver<EngineResponse>,
  pending: Arc<Mutex<PendingMap>>,
  timeout: Duration,
}

impl InFlight {
  pub fn nonce(&self) -> &str {
    &self.nonce
  }

  /// A token that can abort this evaluation from elsewhere. Cancelling
  /// removes the pending resolver, so a late response is ignored and the
  /// waiter observes [`BridgeError::Cancelled`].
  pub fn cancel_token(&self) -> CancelToken {
    CancelToken {
      nonce: self.nonce.clone(),
      pending: Arc::clone(&self.pending),
    }
  }

  /// Waits for the matching response, up to the bridge timeout. On
  /// timeout the pending resolver is evicted and the call fails instead
  /// of hanging forever.
  pub async fn wait(mut self) -> Result<EngineResponse, BridgeError> {
    match tokio::time::timeout(self.timeout, &mut self.rx).await {
      Ok(Ok(response)) => Ok(response),
      Ok(Err(_)) => Err(BridgeError::Cancelled),
      Err(_) => Err(BridgeError::Timeout {
        nonce: self.nonce.clone(),
        timeout: self.timeout,
      }),
    }
    // Drop of `self` removes the pending entry on every failure path.
  }
}

impl Drop for InFlight {
  fn drop(&mut self) {
    if let Ok(mut pending) = self.pending.lock() {
      pending.remove(&self.nonce);
    }
  }
}

pub struct CancelToken {
  nonce: String,
  pending: Arc<Mutex<PendingMap>>,
}

impl CancelToken {
  /// Returns `true` if the evaluation was still pending.
  pub fn cancel(self) -> bool {
    self.pending.lock().unwrap().remove(&self.nonce).is_some()
  }
}
