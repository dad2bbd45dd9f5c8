//! In-memory DOM.
//!
//! A small node tree standing in for the browser document: elements, text,
//! comments and fragments, with attributes, properties and event
//! listeners. Every mutation is counted on the owning [`Document`], which
//! is how template updates are measured.

mod event;
mod node;
pub mod serialize;

pub use event::{Event, EventHandler};
pub use node::{Document, Node, NodeKind};

use crate::template::{self, ParseError};

impl Document {
    /// Parse an HTML fragment into detached nodes owned by this document.
    ///
    /// The result is a fragment node; inserting it moves its children.
    pub fn parse_html(&self, html: &str) -> Result<Node, ParseError> {
        template::parse_fragment(self, html)
    }
}
