//! Derivative, integral, and summation directives.
//!
//! Unlike ordinary commands these do not take a fixed argument count: a
//! `\frac{d}{dx}`, `\int`, or `\sum` is written as a prefix over the rest
//! of the enclosing expression, so each handler flattens the trailing
//! siblings, delegates the symbolic work to the collaborator, and reports
//! `Consumed::ToEnd`.

use super::Emitted;
use crate::ast::Node;
use crate::normalize::Compiler;
use crate::protocol::{Bounds, ComputeJob};
use crate::CompileError;

/// `\frac{d}{dx}`-style numerator/denominator pair recognized as a
/// differentiation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DerivativeDirective {
  pub respect_to: String,
  pub order: u32,
}

/// Tests whether a fraction spells a derivative. The denominator must be
/// `d` followed by the variable name. The numerator must start with `d`;
/// what follows is the order: a number (`d2`), a run of prime marks
/// (`d''`), or nothing (plain `d/dx`, order 1). Anything unparseable
/// falls back to order 1, matching how loosely the notation is written.
pub(crate) fn derivative_directive(
  numerator: &str,
  denominator: &str,
) -> Option<DerivativeDirective> {
  let order_part = numerator.strip_prefix('d')?;
  let respect_to = denominator.strip_prefix('d')?;
  if respect_to.is_empty() {
    return None;
  }
  // A numeric order is read as a leading digit run, so trailing symbol
  // names (`d2y`) don't disqualify it.
  let digits: String =
    order_part.chars().take_while(|c| c.is_ascii_digit()).collect();
  let order = if !digits.is_empty() {
    digits.parse::<u32>().unwrap_or(1).max(1)
  } else if !order_part.is_empty() && order_part.chars().all(|c| c == '\'') {
    order_part.len() as u32
  } else {
    1
  };
  Some(DerivativeDirective {
    respect_to: respect_to.to_string(),
    order,
  })
}

/// `\frac`/`\divide`: an ordinary fraction, unless the numerator and
/// denominator spell a derivative directive, in which case everything
/// after the command is the expression to differentiate.
pub(crate) async fn fraction(
  cx: &Compiler<'_>,
  args: &[Node],
  siblings: &[Node],
  index: usize,
) -> Result<Emitted, CompileError> {
  let [numerator, denominator] = args else {
    return Err(CompileError::MalformedDirective {
      command: "frac",
      reason: format!("expected 2 argument groups, got {}", args.len()),
    });
  };
  let numerator = cx.collapse(numerator.clone()).await?;
  let denominator = cx.collapse(denominator.clone()).await?;

  if let Some(directive) = derivative_directive(&numerator, &denominator) {
    let trailing = siblings[index + 1..].to_vec();
    let expression = cx.flatten_substituted(trailing).await?;
    let result = cx
      .request(ComputeJob::Differentiate {
        expression: format!("({expression})"),
        respect_to: directive.respect_to,
        order: directive.order,
      })
      .await?;
    return Ok(Emitted::to_end(result));
  }

  Ok(Emitted::own(format!("(({numerator})/({denominator}))")))
}

/// `\int`: positional slots starting at the command's own index are
/// `[_, _, subscript, _, superscript, integrand...]` - slots 0, 1, and 3
/// are delimiter markers from the source tree and are discarded. Both
/// bounds non-empty makes the integral definite.
pub(crate) async fn integral(
  cx: &Compiler<'_>,
  siblings: &[Node],
  index: usize,
) -> Result<Emitted, CompileError> {
  let subscript = cx.collapse(positional(siblings, index, 2, "int")?).await?;
  let superscript = cx.collapse(positional(siblings, index, 4, "int")?).await?;
  let trailing = trailing_content(siblings, index);
  let mut integrand = cx.flatten_substituted(trailing).await?;
  if let Some(stripped) = integrand.strip_suffix("dx") {
    integrand = stripped.to_string();
  }

  let bounds = if subscript.is_empty() || superscript.is_empty() {
    // An indefinite result carries a free symbolic remainder; it must not
    // later be evaluated by substituting numeric variables.
    cx.mark_no_var_sub();
    None
  } else {
    Some(Bounds {
      lower: subscript,
      upper: superscript,
    })
  };

  let result = cx
    .request(ComputeJob::Integrate {
      expression: integrand,
      bounds,
    })
    .await?;
  Ok(Emitted::to_end(result))
}

/// `\sum`: same positional layout as `\int`, with the subscript slot
/// holding `variable=start` and the superscript slot the stop value.
pub(crate) async fn summation(
  cx: &Compiler<'_>,
  siblings: &[Node],
  index: usize,
) -> Result<Emitted, CompileError> {
  let start = cx.collapse(positional(siblings, index, 2, "sum")?).await?;
  let stop = cx.collapse(positional(siblings, index, 4, "sum")?).await?;
  let trailing = trailing_content(siblings, index);
  let content = cx.flatten_substituted(trailing).await?;

  let Some((variable, from)) = start.split_once('=') else {
    return Err(CompileError::MalformedDirective {
      command: "sum",
      reason: format!("missing `=` in lower bound `{start}`"),
    });
  };

  let result = cx
    .request(ComputeJob::Sum {
      expression: content,
      variable: variable.to_string(),
      from: from.to_string(),
      to: stop,
    })
    .await?;
  Ok(Emitted::to_end(result))
}

fn positional(
  siblings: &[Node],
  index: usize,
  offset: usize,
  command: &'static str,
) -> Result<Node, CompileError> {
  siblings.get(index + offset).cloned().ok_or_else(|| {
    CompileError::MalformedDirective {
      command,
      reason: format!("missing positional slot {offset}"),
    }
  })
}

fn trailing_content(siblings: &[Node], index: usize) -> Vec<Node> {
  let start = (index + 5).min(siblings.len());
  siblings[start..].to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_d_over_dx_is_order_one() {
    assert_eq!(
      derivative_directive("d", "dx"),
      Some(DerivativeDirective {
        respect_to: "x".to_string(),
        order: 1,
      })
    );
  }

  #[test]
  fn numeric_and_prime_orders() {
    assert_eq!(derivative_directive("d3", "dt").unwrap().order, 3);
    assert_eq!(derivative_directive("d''", "dx").unwrap().order, 2);
    // Order zero makes no sense for the notation; clamp to one.
    assert_eq!(derivative_directive("d0", "dx").unwrap().order, 1);
    // `\frac{d2y}{dx}`: the order is the leading digit run, the rest of
    // the numerator is ignored.
    assert_eq!(derivative_directive("d2y", "dx").unwrap().order, 2);
    assert_eq!(derivative_directive("dy", "dx").unwrap().order, 1);
  }

  #[test]
  fn ordinary_fractions_are_not_directives() {
    assert_eq!(derivative_directive("1", "2"), None);
    // A bare `d` denominator names no variable.
    assert_eq!(derivative_directive("d", "d"), None);
    assert_eq!(derivative_directive("dy", "x2"), None);
  }
}
