//! Wire envelopes exchanged with the computation collaborator.
//!
//! Requests and responses are correlated by nonce only; arrival order
//! carries no meaning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The work a request asks the collaborator to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ComputeJob {
  #[serde(rename_all = "camelCase")]
  Differentiate {
    expression: String,
    respect_to: String,
    order: u32,
  },
  #[serde(rename_all = "camelCase")]
  Integrate {
    expression: String,
    /// `None` requests an indefinite integral.
    bounds: Option<Bounds>,
  },
  #[serde(rename_all = "camelCase")]
  Sum {
    expression: String,
    variable: String,
    from: String,
    to: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub lower: String,
  pub upper: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
  pub nonce: String,
  pub evaluate: ComputeJob,
  /// Registered function expansions, call syntax -> body.
  pub functions: BTreeMap<String, String>,
  /// Numeric variables to substitute engine-side.
  pub variables: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
  pub nonce: String,
  pub result: String,
  #[serde(default)]
  pub flags: ResponseFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFlags {
  /// Set when the result carries a free symbolic remainder (an indefinite
  /// integral) and must not be post-processed by substituting numeric
  /// variables.
  #[serde(rename = "noVarSubInPostProcessing", default)]
  pub no_var_sub_in_post_processing: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn request_wire_shape() {
    let request = EngineRequest {
      nonce: "n-1".to_string(),
      evaluate: ComputeJob::Differentiate {
        expression: "(x^2)".to_string(),
        respect_to: "x".to_string(),
        order: 1,
      },
      functions: BTreeMap::from([("f(x)".to_string(), "x^2".to_string())]),
      variables: BTreeMap::from([("a".to_string(), 2.0)]),
    };
    assert_eq!(
      serde_json::to_value(&request).unwrap(),
      serde_json::json!({
        "nonce": "n-1",
        "evaluate": {
          "op": "differentiate",
          "expression": "(x^2)",
          "respectTo": "x",
          "order": 1
        },
        "functions": { "f(x)": "x^2" },
        "variables": { "a": 2.0 }
      })
    );
  }

  #[test]
  fn response_flags_default_to_false_when_absent() {
    let response: EngineResponse =
      serde_json::from_str(r#"{"nonce": "n-2", "result": "1/2"}"#).unwrap();
    assert_eq!(response.result, "1/2");
    assert!(!response.flags.no_var_sub_in_post_processing);
  }

  #[test]
  fn indefinite_integral_round_trips() {
    let job = ComputeJob::Integrate {
      expression: "x".to_string(),
      bounds: None,
    };
    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(
      value,
      serde_json::json!({ "op": "integrate", "expression": "x", "bounds": null })
    );
    assert_eq!(serde_json::from_value::<ComputeJob>(value).unwrap(), job);
  }
}
