//! Index registration: kinds and per-field accessor specs.

use std::fmt;
use std::sync::Arc;

/// Accessor deriving an index value from a record.
///
/// Returning `None` means the record has no value for this index (no
/// entry is written). Derived values are allowed: a grantee accessor may
/// produce a composite like `user:<idp>:<opaque>`.
pub type ValueFn<R> = Arc<dyn Fn(&R) -> Option<String> + Send + Sync>;

/// The kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// At most one primary key per value.
    Unique,
    /// A value maps to a set of primary keys.
    NonUnique,
    /// Each add allocates one above the highest integer currently
    /// present, clamped to the lower bound.
    Autoincrement {
        /// Smallest integer the index will ever allocate.
        lower_bound: i64,
    },
}

/// Registration of one index over a record type.
pub struct IndexSpec<R> {
    /// Index field name; also the directory name under the container.
    pub name: String,
    /// Index kind.
    pub kind: IndexKind,
    /// Whether values are lower-cased before storage and comparison.
    pub case_insensitive: bool,
    /// Value accessor.
    pub value_fn: ValueFn<R>,
}

impl<R> IndexSpec<R> {
    /// Register a unique index.
    pub fn unique(
        name: impl Into<String>,
        value_fn: impl Fn(&R) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Unique,
            case_insensitive: false,
            value_fn: Arc::new(value_fn),
        }
    }

    /// Register a non-unique index.
    pub fn non_unique(
        name: impl Into<String>,
        value_fn: impl Fn(&R) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::NonUnique,
            case_insensitive: false,
            value_fn: Arc::new(value_fn),
        }
    }

    /// Register an autoincrement index.
    ///
    /// The accessor returns the record's *current* value: `None` (or
    /// empty) on a fresh record triggers allocation; a present value is
    /// re-claimed verbatim, which keeps removal and re-adds stable.
    pub fn autoincrement(
        name: impl Into<String>,
        lower_bound: i64,
        value_fn: impl Fn(&R) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Autoincrement { lower_bound },
            case_insensitive: false,
            value_fn: Arc::new(value_fn),
        }
    }

    /// Lower-case values before storage and comparison.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// The value this spec derives from a record, normalized for storage.
    pub fn value(&self, record: &R) -> Option<String> {
        (self.value_fn)(record).map(|v| {
            if self.case_insensitive {
                v.to_lowercase()
            } else {
                v
            }
        })
    }
}

impl<R> Clone for IndexSpec<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            case_insensitive: self.case_insensitive,
            value_fn: Arc::clone(&self.value_fn),
        }
    }
}

impl<R> fmt::Debug for IndexSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("case_insensitive", &self.case_insensitive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Record {
        name: String,
    }

    #[test]
    fn test_case_insensitive_normalization() {
        let spec =
            IndexSpec::non_unique("name", |r: &Record| Some(r.name.clone())).case_insensitive();
        let record = Record {
            name: "Alice".to_string(),
        };
        assert_eq!(spec.value(&record), Some("alice".to_string()));
    }

    #[test]
    fn test_absent_value() {
        let spec = IndexSpec::unique("name", |_: &Record| None);
        let record = Record {
            name: "x".to_string(),
        };
        assert_eq!(spec.value(&record), None);
    }
}
