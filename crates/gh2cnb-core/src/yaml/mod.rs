//! Anchor-form YAML emission and merge-key expansion.

pub mod anchor;
pub mod merge;

pub use anchor::{emit_with_anchors, quote_if_needed};
pub use merge::expand_merge_keys;
