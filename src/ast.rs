//! Notation tree nodes as handed over by the upstream markup parser.
//!
//! The wire shape is discriminated by a `kind` string (`text.string`,
//! `arg.group`, `command`, `superscript`, ...). Source spans are dropped:
//! nothing in this crate reads positions.

use serde::{Deserialize, Serialize};

/// Records how a text node came to be during normalization.
///
/// The lookbehind rules of the normalizer need to know whether the node to
/// their left was a flattened group (implicit multiplication) or the output
/// of a command handler (implicit function call).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextOrigin {
  /// Present in the source tree.
  #[default]
  Source,
  /// Produced by collapsing a group or a superscript block.
  Group,
  /// Produced by a command handler.
  Command,
}

/// One node of a parsed formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
  #[serde(rename = "text.string")]
  Text {
    content: String,
    #[serde(skip)]
    origin: TextOrigin,
  },
  #[serde(rename = "arg.group")]
  Group { content: Vec<Node> },
  /// A named operator with its argument groups. Each element of `args` is
  /// one argument and is normally a `Group` node.
  #[serde(rename = "command")]
  Command { name: String, args: Vec<Node> },
  /// Marker whose operand is the following sibling.
  #[serde(rename = "superscript")]
  Superscript,
  /// Marker occupying the delimiter slots of `\int_{..}^{..}` and
  /// `\sum_{..}^{..}` trees. Passes through normalization untouched and is
  /// dropped by the final projection.
  #[serde(rename = "subscript")]
  Subscript,
}

impl Node {
  /// A plain text node, as the source tree carries it.
  pub fn text(content: impl Into<String>) -> Node {
    Node::Text {
      content: content.into(),
      origin: TextOrigin::Source,
    }
  }

  /// A text node produced mid-normalization, tagged with its provenance.
  pub(crate) fn produced(content: String, origin: TextOrigin) -> Node {
    Node::Text { content, origin }
  }

  pub fn group(content: Vec<Node>) -> Node {
    Node::Group { content }
  }

  pub fn command(name: impl Into<String>, args: Vec<Node>) -> Node {
    Node::Command {
      name: name.into(),
      args,
    }
  }

  /// The `kind` discriminant, as used on the wire and in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Node::Text { .. } => "text.string",
      Node::Group { .. } => "arg.group",
      Node::Command { .. } => "command",
      Node::Superscript => "superscript",
      Node::Subscript => "subscript",
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Node::Text { content, .. } => Some(content),
      _ => None,
    }
  }
}

/// Joins the text nodes of a normalized sequence, discarding any residue.
pub(crate) fn project(siblings: &[Node]) -> String {
  siblings
    .iter()
    .filter_map(Node::as_text)
    .collect::<Vec<_>>()
    .join("")
}
