//! The tree itself: the node type, the insert/maintenance engine, bulk construction, the
//! branch-and-bound query algorithms, and flat-buffer (de)serialization.

pub mod builders;
pub mod node;
mod query;
mod serialize;
mod tree;

pub use builders::CoverTreeBuilder;
pub use node::Node;
pub use tree::{CoverTree, DEFAULT_BASE};
