//! Fragment payloads and the native/legacy format detector.
//!
//! DESIGN
//! ======
//! A symbol's `fragmentData` is opaque JSON in one of two shapes:
//!
//! - native: a component tree with element/kind fields (`tagName`, `type`)
//!   at the top level. The editing session can link instances to it.
//! - legacy: an envelope `{ id, label, children: [...] }` around a flat
//!   snapshot. Inserted by copy only.
//!
//! [`classify`] is the single discriminator. Merge, extraction and canvas
//! insertion all route through it; nothing else sniffs payload shape.
//! Anything that is not clearly native is treated as not native.

#[cfg(test)]
#[path = "fragment_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level keys that mark a native component payload.
pub const NATIVE_MARKER_KEYS: [&str; 2] = ["tagName", "type"];

// =============================================================================
// DETECTOR
// =============================================================================

/// Borrowed view of a payload after classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FragmentFormat<'a> {
    Native(&'a Map<String, Value>),
    Legacy { id: &'a str, label: &'a str, children: &'a [Value] },
    Unrecognized,
}

/// Classify a payload. Total: never panics, whatever the input.
#[must_use]
pub fn classify(data: &Value) -> FragmentFormat<'_> {
    let Some(obj) = data.as_object() else {
        return FragmentFormat::Unrecognized;
    };

    if NATIVE_MARKER_KEYS
        .iter()
        .any(|key| obj.get(*key).is_some_and(|v| !v.is_null()))
    {
        return FragmentFormat::Native(obj);
    }

    match (
        obj.get("id").and_then(Value::as_str),
        obj.get("label").and_then(Value::as_str),
        obj.get("children").and_then(Value::as_array),
    ) {
        (Some(id), Some(label), Some(children)) => FragmentFormat::Legacy { id, label, children },
        _ => FragmentFormat::Unrecognized,
    }
}

#[must_use]
pub fn is_native_fragment(data: &Value) -> bool {
    matches!(classify(data), FragmentFormat::Native(_))
}

// =============================================================================
// FRAGMENT
// =============================================================================

/// A serialized piece of document content, as stored in the registry and in
/// the session's persisted fragment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(Value);

impl Fragment {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Overwrite the internal id. No-op for non-object payloads.
    pub fn set_id(&mut self, id: impl Into<String>) {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("id".to_owned(), Value::String(id.into()));
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    #[must_use]
    pub fn format(&self) -> FragmentFormat<'_> {
        classify(&self.0)
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        is_native_fragment(&self.0)
    }

    /// Content to insert when no live link is possible.
    ///
    /// Legacy envelopes contribute their children; anything else is copied
    /// whole. Non-object payloads yield nothing.
    #[must_use]
    pub fn copy_content(&self) -> Vec<Value> {
        match self.format() {
            FragmentFormat::Legacy { children, .. } => children.to_vec(),
            FragmentFormat::Native(_) | FragmentFormat::Unrecognized => {
                if self.0.is_object() {
                    vec![self.0.clone()]
                } else {
                    Vec::new()
                }
            }
        }
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Fragment {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
