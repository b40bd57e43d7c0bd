use latexpr::{
  BridgeError, ComputeJob, EngineBridge, EngineRequest, EngineResponse,
  EvalContext, ResponseFlags,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;

type Channels = (
  EngineBridge,
  mpsc::Receiver<EngineRequest>,
  mpsc::Sender<EngineResponse>,
);

fn manual_bridge(timeout: Duration) -> Channels {
  let (req_tx, req_rx) = mpsc::channel(8);
  let (resp_tx, resp_rx) = mpsc::channel(8);
  (EngineBridge::new(req_tx, resp_rx, timeout), req_rx, resp_tx)
}

fn job(expression: &str) -> ComputeJob {
  ComputeJob::Differentiate {
    expression: expression.to_string(),
    respect_to: "x".to_string(),
    order: 1,
  }
}

fn response(nonce: &str, result: &str) -> EngineResponse {
  EngineResponse {
    nonce: nonce.to_string(),
    result: result.to_string(),
    flags: ResponseFlags::default(),
  }
}

#[tokio::test]
async fn responses_are_matched_by_nonce_not_arrival_order() {
  let (bridge, mut req_rx, resp_tx) = manual_bridge(Duration::from_secs(5));
  let cx = EvalContext::new();

  let call_a = bridge.submit(job("a"), &cx).await.unwrap();
  let call_b = bridge.submit(job("b"), &cx).await.unwrap();
  let first = req_rx.recv().await.unwrap();
  let second = req_rx.recv().await.unwrap();
  assert_eq!(first.nonce, call_a.nonce());
  assert_eq!(second.nonce, call_b.nonce());

  // Deliver B's answer before A's; each caller must still get its own.
  resp_tx.send(response(&second.nonce, "B")).await.unwrap();
  resp_tx.send(response(&first.nonce, "A")).await.unwrap();

  assert_eq!(call_a.wait().await.unwrap().result, "A");
  assert_eq!(call_b.wait().await.unwrap().result, "B");
  assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn requests_carry_the_context_views() {
  let (bridge, mut req_rx, resp_tx) = manual_bridge(Duration::from_secs(5));
  let mut cx = EvalContext::new();
  cx.define_variable("a", 2.0);
  cx.define_function("f", "f(x)", "x^2");

  let call = bridge.submit(job("a*x"), &cx).await.unwrap();
  let request = req_rx.recv().await.unwrap();
  assert_eq!(request.variables.get("a"), Some(&2.0));
  assert_eq!(request.functions.get("f(x)"), Some(&"x^2".to_string()));

  resp_tx.send(response(&request.nonce, "2*a")).await.unwrap();
  assert_eq!(call.wait().await.unwrap().result, "2*a");
}

#[tokio::test]
async fn a_silent_collaborator_times_out_and_evicts() {
  let (bridge, _req_rx, _resp_tx) = manual_bridge(Duration::from_millis(50));
  let cx = EvalContext::new();

  let outcome = bridge.evaluate(job("x"), &cx).await;
  assert!(matches!(outcome, Err(BridgeError::Timeout { .. })));
  // The pending map must not keep the dead entry around.
  assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn cancellation_removes_the_resolver_and_ignores_late_replies() {
  let (bridge, mut req_rx, resp_tx) = manual_bridge(Duration::from_secs(5));
  let cx = EvalContext::new();

  let call = bridge.submit(job("x"), &cx).await.unwrap();
  let request = req_rx.recv().await.unwrap();

  assert!(call.cancel_token().cancel());
  assert_eq!(bridge.pending_count(), 0);
  assert!(matches!(call.wait().await, Err(BridgeError::Cancelled)));

  // A reply that arrives after cancellation is dropped by the router.
  resp_tx.send(response(&request.nonce, "late")).await.unwrap();
  tokio::task::yield_now().await;
  assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn unknown_nonces_are_ignored_not_escalated() {
  let (bridge, mut req_rx, resp_tx) = manual_bridge(Duration::from_secs(5));
  let cx = EvalContext::new();

  resp_tx.send(response("no-such-nonce", "?")).await.unwrap();

  let call = bridge.submit(job("x"), &cx).await.unwrap();
  let request = req_rx.recv().await.unwrap();
  resp_tx.send(response(&request.nonce, "2")).await.unwrap();
  assert_eq!(call.wait().await.unwrap().result, "2");
}

#[tokio::test]
async fn abandoning_a_call_does_not_leak_its_resolver() {
  let (bridge, _req_rx, _resp_tx) = manual_bridge(Duration::from_secs(5));
  let cx = EvalContext::new();

  let call = bridge.submit(job("x"), &cx).await.unwrap();
  assert_eq!(bridge.pending_count(), 1);
  drop(call);
  assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn a_gone_collaborator_is_reported_as_disconnected() {
  let (req_tx, req_rx) = mpsc::channel(8);
  let (_resp_tx, resp_rx) = mpsc::channel::<EngineResponse>(8);
  drop(req_rx);
  let bridge = EngineBridge::new(req_tx, resp_rx, Duration::from_secs(5));

  let outcome = bridge.evaluate(job("x"), &EvalContext::new()).await;
  assert!(matches!(outcome, Err(BridgeError::Disconnected)));
  assert_eq!(bridge.pending_count(), 0);
}
