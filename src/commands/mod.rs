//! The command dispatch table.
//!
//! Every recognized markup command maps to one [`Handler`]. The registry
//! is built from a single explicit registration list at first use; there
//! is no implicit side-effect registration. Calculus directives live in
//! their own submodule because they consume trailing siblings and talk to
//! the computation collaborator.

mod calculus;

use crate::ast::Node;
use crate::normalize::Compiler;
use crate::CompileError;
use std::collections::HashMap;
use std::sync::OnceLock;

/// How much of the sibling sequence a handler took ownership of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
  /// The command node and its own argument groups only.
  Own,
  /// Everything from the command's index to the end of the sequence.
  /// Derivative, integral, and summation directives are written as prefix
  /// operators over the rest of the formula, so they own it.
  ToEnd,
}

/// A handler's result: the text that replaces the command node, plus how
/// far the normalizer must skip. Returning the consumed extent explicitly
/// keeps truncation a data transformation instead of an aliasing side
/// effect on the shared sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
  pub text: String,
  pub consumed: Consumed,
}

impl Emitted {
  pub fn own(text: String) -> Emitted {
    Emitted {
      text,
      consumed: Consumed::Own,
    }
  }

  pub fn to_end(text: String) -> Emitted {
    Emitted {
      text,
      consumed: Consumed::ToEnd,
    }
  }
}

/// One dispatchable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
  /// Emits a fixed literal, ignoring any arguments.
  Literal(&'static str),
  Sqrt,
  Fraction,
  Integral,
  Summation,
}

impl Handler {
  pub(crate) async fn invoke(
    &self,
    cx: &Compiler<'_>,
    args: &[Node],
    siblings: &[Node],
    index: usize,
  ) -> Result<Emitted, CompileError> {
    match self {
      Handler::Literal(text) => Ok(Emitted::own((*text).to_string())),
      Handler::Sqrt => {
        let inner = cx.flatten(args.to_vec()).await?;
        Ok(Emitted::own(format!("sqrt({inner})")))
      }
      Handler::Fraction => calculus::fraction(cx, args, siblings, index).await,
      Handler::Integral => calculus::integral(cx, siblings, index).await,
      Handler::Summation => calculus::summation(cx, siblings, index).await,
    }
  }
}

pub struct Registry {
  handlers: HashMap<&'static str, Handler>,
}

impl Registry {
  /// The built-in command surface. `left`/`right` are deliberately absent:
  /// they are filtered out before normalization begins.
  pub fn builtin() -> &'static Registry {
    static BUILTIN: OnceLock<Registry> = OnceLock::new();
    BUILTIN.get_or_init(|| {
      Registry::from_entries([
        ("frac", Handler::Fraction),
        ("divide", Handler::Fraction),
        ("int", Handler::Integral),
        ("sum", Handler::Summation),
        ("sqrt", Handler::Sqrt),
        ("cdot", Handler::Literal("*")),
        ("sin", Handler::Literal("sin")),
        ("cos", Handler::Literal("cos")),
        ("tan", Handler::Literal("tan")),
        ("sec", Handler::Literal("sec")),
        ("csc", Handler::Literal("csc")),
        ("cot", Handler::Literal("cot")),
        ("pi", Handler::Literal("pi")),
        ("ln", Handler::Literal("log")),
        ("log", Handler::Literal("log")),
      ])
    })
  }

  fn from_entries(
    entries: impl IntoIterator<Item = (&'static str, Handler)>,
  ) -> Registry {
    Registry {
      handlers: entries.into_iter().collect(),
    }
  }

  pub fn get(&self, name: &str) -> Option<&Handler> {
    self.handlers.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn aliases_share_a_handler() {
    let registry = Registry::builtin();
    assert_eq!(registry.get("frac"), registry.get("divide"));
    assert_eq!(registry.get("ln"), Some(&Handler::Literal("log")));
  }

  #[test]
  fn delimiters_are_not_registered() {
    let registry = Registry::builtin();
    assert_eq!(registry.get("left"), None);
    assert_eq!(registry.get("right"), None);
  }
}
