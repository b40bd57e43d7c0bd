//! Group Collapser and AST Normalizer: the single rewrite pass that turns
//! a sibling sequence of notation nodes into flat algebraic text.
//!
//! The pass walks the input buffer with an explicit cursor and appends to
//! an output vector; handlers report how far they consumed instead of
//! splicing a shared array, so "eat the rest of the expression" is a
//! plain data transformation. Lookbehind is the last output element,
//! lookahead is the next input element.

use crate::ast::{project, Node, TextOrigin};
use crate::bridge::EngineBridge;
use crate::commands::{Consumed, Emitted, Registry};
use crate::context::EvalContext;
use crate::protocol::ComputeJob;
use crate::CompileError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of compiling one formula.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
  /// The formula as one linear expression string.
  pub expression: String,
  /// Set when the result contains a free symbolic remainder (indefinite
  /// integral) and numeric variables must not be substituted afterwards.
  pub no_var_sub_in_post_processing: bool,
}

/// What the rewrite rules see to their left.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Lookbehind {
  /// A group, or text that came from flattening one.
  Group,
  /// Text produced by a command handler.
  Command,
  Other,
  Nothing,
}

/// One evaluation's worth of normalization state. The context and the
/// collaborator handle are injected; nothing is reached through globals.
pub struct Compiler<'a> {
  context: &'a EvalContext,
  bridge: &'a EngineBridge,
  registry: &'static Registry,
  no_var_sub: AtomicBool,
}

impl<'a> Compiler<'a> {
  pub fn new(context: &'a EvalContext, bridge: &'a EngineBridge) -> Self {
    Compiler {
      context,
      bridge,
      registry: Registry::builtin(),
      no_var_sub: AtomicBool::new(false),
    }
  }

  /// Compiles a top-level sibling sequence into one expression string.
  pub async fn compile(
    &self,
    siblings: Vec<Node>,
  ) -> Result<CompileOutput, CompileError> {
    let expression = self.flatten(siblings).await?;
    Ok(CompileOutput {
      expression,
      no_var_sub_in_post_processing: self.no_var_sub.load(Ordering::Relaxed),
    })
  }

  /// Normalizes a sibling sequence: afterwards every element is text.
  pub async fn normalize(
    &self,
    siblings: Vec<Node>,
  ) -> Result<Vec<Node>, CompileError> {
    self.condense(siblings).await
  }

  /// Collapses one node to its flat text. Text passes through unchanged;
  /// a group is normalized and its text concatenated; any other kind is a
  /// contract violation and fails this sub-evaluation.
  pub async fn collapse(&self, node: Node) -> Result<String, CompileError> {
    match node {
      Node::Text { content, .. } => Ok(content),
      Node::Group { content } => {
        let condensed = self.condense(content).await?;
        Ok(project(&condensed))
      }
      other => Err(CompileError::InvalidNodeKind { kind: other.kind() }),
    }
  }

  /// Filters delimiter commands, normalizes, and joins: the full
  /// tree-to-expression projection.
  pub(crate) async fn flatten(
    &self,
    siblings: Vec<Node>,
  ) -> Result<String, CompileError> {
    let siblings: Vec<Node> =
      siblings.into_iter().filter(|n| !is_delimiter(n)).collect();
    let condensed = self.condense(siblings).await?;
    Ok(project(&condensed))
  }

  /// [`flatten`](Self::flatten) followed by macro substitution of
  /// registered function references, the form sent to the collaborator.
  pub(crate) async fn flatten_substituted(
    &self,
    siblings: Vec<Node>,
  ) -> Result<String, CompileError> {
    let flat = self.flatten(siblings).await?;
    Ok(self.context.substitute_function_references(&flat))
  }

  /// Sends one job to the collaborator and folds its response flags into
  /// this evaluation.
  pub(crate) async fn request(
    &self,
    job: ComputeJob,
  ) -> Result<String, CompileError> {
    let response = self.bridge.evaluate(job, self.context).await?;
    if response.flags.no_var_sub_in_post_processing {
      self.mark_no_var_sub();
    }
    Ok(response.result)
  }

  pub(crate) fn mark_no_var_sub(&self) {
    self.no_var_sub.store(true, Ordering::Relaxed);
  }

  /// The single forward rewrite pass. Boxed because nested groups re-enter
  /// it through [`collapse`](Self::collapse).
  fn condense<'s>(
    &'s self,
    siblings: Vec<Node>,
  ) -> BoxFut<'s, Result<Vec<Node>, CompileError>> {
    Box::pin(async move {
      let mut out: Vec<Node> = Vec::with_capacity(siblings.len());
      let mut cursor = 0;

      while cursor < siblings.len() {
        match &siblings[cursor] {
          Node::Superscript => {
            let Some(Node::Group { content }) = siblings.get(cursor + 1) else {
              out.push(siblings[cursor].clone());
              cursor += 1;
              continue;
            };
            let inner = self.collapse(Node::group(content.clone())).await?;
            // Already rewritten on a re-entrant pass; don't double-wrap.
            let flat = if inner.starts_with('^') {
              inner
            } else {
              format!("^({inner})")
            };
            out.push(Node::produced(flat, TextOrigin::Group));
            cursor += 2;
          }

          Node::Command { name, args } => {
            let Some(handler) = self.registry.get(name) else {
              log::debug!("dropping unknown command `{name}`");
              cursor += 1;
              continue;
            };
            let emitted =
              match handler.invoke(self, args, &siblings, cursor).await {
                Ok(emitted) => emitted,
                Err(error) => {
                  // A failing handler poisons only its own sub-expression.
                  log::debug!("command `{name}` failed: {error}");
                  Emitted::own("error".to_string())
                }
              };
            out.push(Node::produced(emitted.text, TextOrigin::Command));
            match emitted.consumed {
              Consumed::Own => cursor += 1,
              // The directive owns everything to the end of the sequence;
              // nothing past this point may be visited.
              Consumed::ToEnd => break,
            }
          }

          Node::Text { content, .. } => {
            let prev = lookbehind(out.last());
            match prev {
              Lookbehind::Group => {
                // Implicit multiplication after a closed group, except
                // for a bare closing paren.
                if content != ")" {
                  out.push(Node::text("*"));
                }
                out.push(siblings[cursor].clone());
                cursor += 1;
              }
              Lookbehind::Command if !content.starts_with('(') => {
                // Speculatively flatten a 3-node window; if it spells a
                // registered function call, fold it into one parenthesized
                // call fragment.
                let end = (cursor + 3).min(siblings.len());
                let window =
                  self.condense(siblings[cursor..end].to_vec()).await?;
                let flat = project(&window);
                if self.context.is_function_call(&flat) {
                  out.push(Node::produced(
                    format!("({flat})"),
                    TextOrigin::Source,
                  ));
                  cursor = end;
                } else {
                  out.push(siblings[cursor].clone());
                  cursor += 1;
                }
              }
              _ => {
                out.push(siblings[cursor].clone());
                cursor += 1;
              }
            }
          }

          // Groups not claimed by a rule, subscript markers, etc. pass
          // through; the sweep below flattens the groups.
          _ => {
            out.push(siblings[cursor].clone());
            cursor += 1;
          }
        }
      }

      // Final sweep: flatten leftover groups. No dispatch re-runs at this
      // level; collapsing a group only normalizes its own children.
      let mut swept = Vec::with_capacity(out.len());
      for node in out {
        match node {
          Node::Group { content } => {
            let flat = self.collapse(Node::group(content)).await?;
            swept.push(Node::produced(flat, TextOrigin::Group));
          }
          other => swept.push(other),
        }
      }
      Ok(swept)
    })
  }
}

fn lookbehind(prev: Option<&Node>) -> Lookbehind {
  match prev {
    Some(Node::Group { .. }) => Lookbehind::Group,
    Some(Node::Text {
      origin: TextOrigin::Group,
      ..
    }) => Lookbehind::Group,
    Some(Node::Text {
      origin: TextOrigin::Command,
      ..
    }) => Lookbehind::Command,
    Some(_) => Lookbehind::Other,
    None => Lookbehind::Nothing,
  }
}

fn is_delimiter(node: &Node) -> bool {
  matches!(node, Node::Command { name, .. } if name == "left" || name == "right")
}
