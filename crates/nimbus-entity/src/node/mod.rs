//! File and folder tree entities.

pub mod category;
pub mod model;

pub use category::TypeCategory;
pub use model::{NewNode, Node, NodeKind};
