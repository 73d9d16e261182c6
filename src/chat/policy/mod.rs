//! Pure list policies: ordering and eviction.

pub mod eviction;
pub mod ordering;

pub use eviction::{EvictionReport, evict_to_budget};
pub use ordering::{
    insert_after_pinned, is_pinned_prefix, pinned_count, sort_pinned_first, toggle_pin,
};
