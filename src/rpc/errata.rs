//! Accumulating diagnostic trail.
//!
//! Unlike a single [`RpcError`](super::RpcError), an [`Errata`] collects every
//! problem found during a multi-step operation (a handler walking a list of
//! records, a chain of permission checkers) so the caller sees the whole
//! picture.

use serde::Serialize;
use serde_json::Value;

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Domain-specific code.
    pub code: i32,
    /// Description of the problem.
    pub message: String,
}

/// An ordered list of annotations. Empty means success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errata {
    annotations: Vec<Annotation>,
}

impl Errata {
    /// Creates an empty errata.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            annotations: Vec::new(),
        }
    }

    /// Creates an errata holding a single annotation.
    #[must_use]
    pub fn single(code: i32, message: impl Into<String>) -> Self {
        let mut errata = Self::new();
        errata.push(code, message);
        errata
    }

    /// Appends an annotation.
    pub fn push(&mut self, code: i32, message: impl Into<String>) -> &mut Self {
        self.annotations.push(Annotation {
            code,
            message: message.into(),
        });
        self
    }

    /// Moves every annotation of `other` to the end of this errata.
    pub fn append(&mut self, mut other: Self) {
        self.annotations.append(&mut other.annotations);
    }

    /// Returns `true` when nothing was reported.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Number of annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Returns `true` when there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Iterates over the annotations in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }

    /// Renders the annotations as the `data` member of an error response.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.annotations).unwrap_or(Value::Null)
    }
}

impl<'a> IntoIterator for &'a Errata {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Display for Errata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for annotation in &self.annotations {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "[{}] {}", annotation.code, annotation.message)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_ok() {
        let errata = Errata::new();
        assert!(errata.is_ok());
        assert_eq!(errata.to_value(), serde_json::json!([]));
    }

    #[test]
    fn keeps_insertion_order() {
        let mut errata = Errata::single(1, "first");
        errata.push(2, "second");
        errata.append(Errata::single(3, "third"));

        let codes: Vec<i32> = errata.iter().map(|a| a.code).collect();
        assert_eq!(codes, vec![1, 2, 3]);
        assert_eq!(errata.to_string(), "[1] first; [2] second; [3] third");
    }

    #[test]
    fn renders_as_code_message_array() {
        let errata = Errata::single(9999, "Just an error message");
        assert_eq!(
            errata.to_value(),
            serde_json::json!([{"code": 9999, "message": "Just an error message"}])
        );
    }
}
