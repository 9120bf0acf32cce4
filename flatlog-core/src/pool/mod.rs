//! Handle pool - bounded, schema-aware pool of open append writers
//!
//! Each stream type owns an independent pool of open candidate files.
//! Two lock tiers coordinate access:
//!
//! - a **structural lock** over the whole registry serializes every
//!   pool-shape change (namespace creation, handle registration,
//!   eviction), and
//! - a **per-file write-exclusion lock** serializes appends to one file
//!   while leaving appends to different files fully parallel.
//!
//! The resolver hands out [`FileLease`] guards that hold the per-file
//! lock until dropped, so a writer can never be interrupted mid-append
//! and the lock releases on every exit path.

mod handle;
mod registry;

pub use handle::FileLease;
pub use registry::HandleRegistry;
