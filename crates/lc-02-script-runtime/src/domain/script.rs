use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ScriptFault;
use crate::language::ast::Expr;

/// Stored script source: a JSON document in the sandbox language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    source: String,
}

impl Script {
    /// Wrap script source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Script whose source is the given JSON program.
    pub fn from_program(program: &Value) -> Self {
        Self::new(program.to_string())
    }

    /// Source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse the source into an expression tree.
    pub fn compile(&self) -> Result<Expr, ScriptFault> {
        let document: Value = serde_json::from_str(&self.source)
            .map_err(|e| ScriptFault::InvalidScript(format!("not valid JSON: {e}")))?;
        Expr::parse(&document)
    }
}
