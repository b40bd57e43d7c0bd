//! The evaluation context: a per-request snapshot of the user's symbol
//! definitions, read-only during normalization.

use std::collections::BTreeMap;

/// What a symbol name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
  /// A numeric variable, substituted by the computation collaborator.
  Variable(f64),
  /// A user-defined function, expanded by textual macro substitution.
  Function {
    /// The call syntax the user wrote, e.g. `f(x)`.
    call_syntax: String,
    /// The right-hand side of the definition, e.g. `x^2+1`.
    body: String,
  },
}

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
  entries: BTreeMap<String, Binding>,
}

impl EvalContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn define_variable(&mut self, name: impl Into<String>, value: f64) {
    self.entries.insert(name.into(), Binding::Variable(value));
  }

  pub fn define_function(
    &mut self,
    name: impl Into<String>,
    call_syntax: impl Into<String>,
    body: impl Into<String>,
  ) {
    self.entries.insert(
      name.into(),
      Binding::Function {
        call_syntax: call_syntax.into(),
        body: body.into(),
      },
    );
  }

  /// The numeric entries, keyed by symbol name.
  pub fn variables(&self) -> BTreeMap<String, f64> {
    self
      .entries
      .iter()
      .filter_map(|(name, binding)| match binding {
        Binding::Variable(value) => Some((name.clone(), *value)),
        Binding::Function { .. } => None,
      })
      .collect()
  }

  /// The function entries, keyed by call syntax (`f(x)` -> `x^2+1`).
  pub fn functions(&self) -> BTreeMap<String, String> {
    self
      .entries
      .values()
      .filter_map(|binding| match binding {
        Binding::Function { call_syntax, body } => {
          Some((call_syntax.clone(), body.clone()))
        }
        Binding::Variable(_) => None,
      })
      .collect()
  }

  /// Whether `call` is exactly the call syntax of a registered function.
  pub fn is_function_call(&self, call: &str) -> bool {
    self.entries.values().any(|binding| {
      matches!(binding, Binding::Function { call_syntax, .. } if call_syntax == call)
    })
  }

  /// Replaces references to registered functions with their literal bodies.
  ///
  /// This is plain textual substitution, not scoped evaluation: one
  /// replace-all pass per function, in registration order. A body that
  /// contains its own call syntax would never make progress, so those are
  /// skipped outright. Whether richer recursion should be supported is an
  /// open product question; see DESIGN.md.
  pub fn substitute_function_references(&self, expression: &str) -> String {
    let mut out = expression.to_string();
    for (call_syntax, body) in self.functions() {
      if body.contains(&call_syntax) {
        log::warn!(
          "skipping self-referential function `{call_syntax}` during substitution"
        );
        continue;
      }
      out = out.replace(&call_syntax, &body);
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn context() -> EvalContext {
    let mut cx = EvalContext::new();
    cx.define_variable("a", 3.0);
    cx.define_variable("b", -0.5);
    cx.define_function("f", "f(x)", "x^2+1");
    cx
  }

  #[test]
  fn splits_variables_from_functions() {
    let cx = context();
    assert_eq!(
      cx.variables(),
      BTreeMap::from([("a".to_string(), 3.0), ("b".to_string(), -0.5)])
    );
    assert_eq!(
      cx.functions(),
      BTreeMap::from([("f(x)".to_string(), "x^2+1".to_string())])
    );
    assert!(cx.is_function_call("f(x)"));
    assert!(!cx.is_function_call("f"));
  }

  #[test]
  fn substitutes_every_occurrence_in_one_pass() {
    let cx = context();
    assert_eq!(
      cx.substitute_function_references("f(x)+2*f(x)"),
      "x^2+1+2*x^2+1"
    );
  }

  #[test]
  fn self_referential_function_is_left_alone() {
    let mut cx = EvalContext::new();
    cx.define_function("g", "g(x)", "g(x)+1");
    // Must terminate and leave the reference untouched.
    assert_eq!(cx.substitute_function_references("g(x)*2"), "g(x)*2");
  }
}
