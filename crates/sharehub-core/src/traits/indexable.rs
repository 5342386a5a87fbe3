//! Trait for records that can be secondary-indexed.

/// A record type whose instances can be tracked by the indexer.
///
/// `type_name` names the record kind in diagnostics; `primary_key` is the
/// value index entries resolve to. Field values are supplied per index by
/// registered accessor functions, not by this trait, so "index by derived
/// value" stays statically checked.
pub trait Indexable: Clone + Send + Sync + 'static {
    /// Stable name of the record kind (e.g. "share").
    fn type_name() -> &'static str;

    /// The record's primary-key value.
    fn primary_key(&self) -> String;
}
