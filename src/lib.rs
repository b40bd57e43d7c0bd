//! Compiles parsed LaTeX-style math notation into one linear algebraic
//! expression string, delegating differentiation, integration, and
//! summation to an external symbolic-computation collaborator over a
//! nonce-correlated asynchronous protocol.
//!
//! The upstream markup parser and the symbolic engine itself are external
//! collaborators; this crate owns the tree rewriting in between.

use thiserror::Error;

pub mod ast;
pub mod bridge;
pub mod commands;
pub mod context;
pub mod normalize;
pub mod protocol;

pub use ast::{Node, TextOrigin};
pub use bridge::{BridgeError, CancelToken, EngineBridge, InFlight};
pub use commands::{Consumed, Emitted, Handler, Registry};
pub use context::{Binding, EvalContext};
pub use normalize::{CompileOutput, Compiler};
pub use protocol::{
  Bounds, ComputeJob, EngineRequest, EngineResponse, ResponseFlags,
};

#[derive(Error, Debug)]
pub enum CompileError {
  /// The Group Collapser only ever accepts text and group nodes.
  #[error("illegal node passed to collapser: {kind}")]
  InvalidNodeKind { kind: &'static str },
  /// A calculus directive's positional slots or bound syntax were not
  /// what the notation promises. Caught at the handler boundary and
  /// degraded to an `error` marker in the compiled expression.
  #[error("malformed `{command}` directive: {reason}")]
  MalformedDirective {
    command: &'static str,
    reason: String,
  },
  #[error(transparent)]
  Bridge(#[from] BridgeError),
}

/// Compiles one formula's sibling sequence against a context, using the
/// given collaborator bridge for calculus directives.
pub async fn compile(
  siblings: Vec<Node>,
  context: &EvalContext,
  bridge: &EngineBridge,
) -> Result<CompileOutput, CompileError> {
  Compiler::new(context, bridge).compile(siblings).await
}
