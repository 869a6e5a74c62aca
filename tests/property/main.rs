//! Property-based tests for the matcher and the pager.
//!
//! Run with: `cargo test --test property`

mod matcher_props;
mod pager_props;
