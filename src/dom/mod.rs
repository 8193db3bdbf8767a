//! In-memory XML tree used by every conversion stage.
//!
//! - [`Document`]: arena tree with namespace-aware attribute access
//! - [`parse_document`]: quick-xml reader into a [`Document`]
//! - [`serialize_document`]: [`Document`] back to XML text

mod arena;
mod parse;
mod serialize;

pub use arena::{Attribute, ChildIter, DfsIter, Document, Node, NodeData, NodeId, XML_NS, split_qname};
pub use parse::parse_document;
pub use serialize::{serialize_document, serialize_node};
