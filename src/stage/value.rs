//! Stage Value Encoding
//!
//! Mirrors `values.py`'s `Value`/`String`/`Integer`/`Variable`/`Block`
//! hierarchy, collapsed into one enum since Rust has no use for a class
//! per encoding. Each input or field slot in a block wants a different
//! JSON shape for the same underlying value, so encoding is split into
//! one method per slot kind rather than a single `get_value`: a block
//! reporter plugged into a boolean slot, a C-block substack slot, and a
//! value-typed input slot are three different arrays even though
//! they're all "a block id".

use serde_json::{json, Value as Json};

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum StageValue {
    Number(f64),
    Str(String),
    Variable { name: String, id: String },
    List { name: String, id: String },
    /// A fixed menu choice (e.g. `_myself_`, `all`) that isn't backed by
    /// a declared variable or list, so its field id half is `null`.
    FieldLiteral(String),
    /// The id of a reporter or statement block already emitted into the
    /// target's block map.
    Block(String),
}

impl StageValue {
    /// Encoding for an ordinary value-typed input slot (e.g. `NUM1` on
    /// `operator_add`). Numbers and strings get the Scratch primitive
    /// shadow wrapper; a variable or list reporter gets wrapped in the
    /// `[3, ..., [10, ""]]` "reporter with no shadow visible" form;
    /// a block is encoded the same way `as_shadow` encodes it.
    pub fn as_normal(&self) -> Result<Json> {
        match self {
            StageValue::Number(n) => Ok(json!([1, [4, format_number(*n)]])),
            StageValue::Str(s) => Ok(json!([1, [10, s]])),
            StageValue::Variable { name, id } => Ok(json!([3, [12, name, id], [10, ""]])),
            StageValue::List { name, id } => Ok(json!([3, [13, name, id], [10, ""]])),
            StageValue::FieldLiteral(s) => Ok(json!([1, [10, s]])),
            StageValue::Block(_) => self.as_shadow(),
        }
    }

    /// Encoding for a field slot (e.g. `VARIABLE` on
    /// `data_setvariableto`, or a fixed menu choice like `CLONE_OPTION`):
    /// names the referenced thing directly rather than nesting a
    /// reporter. A variable/list field pairs its display name with its
    /// id; a literal menu choice or bare string pairs itself with `null`.
    pub fn as_field(&self) -> Result<Json> {
        match self {
            StageValue::Variable { name, id } | StageValue::List { name, id } => Ok(json!([name, id])),
            StageValue::FieldLiteral(s) | StageValue::Str(s) => Ok(json!([s, Json::Null])),
            other => Err(CompileError::value(format!("{other:?} cannot be used as a field"))),
        }
    }

    /// Encoding for a boolean-typed input slot. Only a reporter block
    /// fits here; booleans have no primitive shadow in this format.
    pub fn as_boolean(&self) -> Result<Json> {
        self.as_block()
    }

    /// Encoding for a C-block substack slot (`SUBSTACK`, `SUBSTACK2`):
    /// a bare block reference with no shadow wrapper.
    pub fn as_block(&self) -> Result<Json> {
        match self {
            StageValue::Block(id) => Ok(json!([2, id])),
            other => Err(CompileError::value(format!("{other:?} cannot be used as a block slot"))),
        }
    }

    /// Encoding for a value-typed input slot filled by a reporter
    /// block rather than a literal: the block id plus an empty string
    /// shadow, matching `Block.get_value()`.
    pub fn as_shadow(&self) -> Result<Json> {
        match self {
            StageValue::Block(id) => Ok(json!([3, id, [10, ""]])),
            other => Err(CompileError::value(format!("{other:?} cannot be used as a shadow value"))),
        }
    }
}

/// Scratch stores numeric literals as strings, and drops a trailing
/// `.0` for integral values (`5`, not `5.0`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_drops_trailing_zero_fraction() {
        let v = StageValue::Number(5.0);
        assert_eq!(v.as_normal().unwrap(), json!([1, [4, "5"]]));
    }

    #[test]
    fn number_keeps_fractional_digits() {
        let v = StageValue::Number(3.5);
        assert_eq!(v.as_normal().unwrap(), json!([1, [4, "3.5"]]));
    }

    #[test]
    fn string_normal_shape() {
        let v = StageValue::Str("hi".into());
        assert_eq!(v.as_normal().unwrap(), json!([1, [10, "hi"]]));
    }

    #[test]
    fn variable_field_vs_normal_shapes_differ() {
        let v = StageValue::Variable { name: "x".into(), id: "abc".into() };
        assert_eq!(v.as_field().unwrap(), json!(["x", "abc"]));
        assert_eq!(v.as_normal().unwrap(), json!([3, [12, "x", "abc"], [10, ""]]));
    }

    #[test]
    fn block_block_vs_shadow_shapes_differ() {
        let v = StageValue::Block("xyz".into());
        assert_eq!(v.as_block().unwrap(), json!([2, "xyz"]));
        assert_eq!(v.as_shadow().unwrap(), json!([3, "xyz", [10, ""]]));
        assert_eq!(v.as_boolean().unwrap(), json!([2, "xyz"]));
    }

    #[test]
    fn field_literal_pairs_with_null() {
        let v = StageValue::FieldLiteral("_myself_".into());
        assert_eq!(v.as_field().unwrap(), json!(["_myself_", null]));
    }

    #[test]
    fn mismatched_slot_uses_are_value_errors() {
        assert!(StageValue::Number(1.0).as_field().is_err());
        assert!(StageValue::Number(1.0).as_block().is_err());
        assert!(StageValue::Variable { name: "a".into(), id: "a".into() }.as_block().is_err());
        assert!(StageValue::Block("a".into()).as_field().is_err());
    }
}
