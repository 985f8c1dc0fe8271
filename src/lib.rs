//! # freeplane-dom
//!
//! A document object model for Freeplane mindmap files (`.mm`).
//!
//! ## Overview
//!
//! freeplane-dom loads a mindmap into an attributed element tree, hands out lightweight
//! [`Node`] views over it, and writes the tree back in the byte format the map's version calls
//! for. Nodes can be created outside of any document, grown into whole branches there, and
//! attached to a document later.
//!
//! ### Key Features
//!
//! - **Faithful round trips**: element order, attribute order and text layout survive a
//!   load/save cycle
//! - **Both format eras**: windows-1252 maps (`<= 1.6`) and UTF-8 maps, including the legacy
//!   umlaut escaping older editors expect
//! - **Load-time repair**: maps broken by HTML `&nbsp;` entities are repaired instead of rejected
//! - **Detached branches**: subtrees built outside a document keep working parent lookups and can
//!   be spliced in with [`Node::attach`]
//! - **Filters**: [`NodeFilter`] combines text, id, attribute, link, icon, rich content and style
//!   predicates
//!
//! ## Architecture
//!
//! - **[`element`]**: the shared attributed element tree
//! - **[`codec`]**: version detection, byte encodings, XML reading and writing
//! - **[`mindmap`]**: the document, its parent map, default skeleton and style sheet
//! - **[`node`]**: node views, content accessors and the structural state machine
//! - **[`branch`]**: parent bookkeeping for detached subtrees
//! - **[`query`]**: the predicate matcher behind every search
//! - **[`ident`]**: node identifier allocation
//! - **[`config`]**: TOML configuration for new maps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use freeplane_dom::{Mindmap, NewNode, NodeFilter};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let map = Mindmap::open(Path::new("plans.mm"))?;
//!     let mut root = map.rootnode();
//!     let mut todo = root
//!         .add_child(NewNode::new("TODO").style("styles.important"))
//!         .ok_or("could not add node")?;
//!     todo.add_child("write docs");
//!
//!     for node in map.find_nodes(&NodeFilter::new().core("docs")) {
//!         println!("{}: {}", node.id(), node);
//!     }
//!     map.save(Path::new("plans.mm"))?;
//!     Ok(())
//! }
//! ```
//!
//! ### Detached branches
//!
//! ```rust
//! use freeplane_dom::{Mindmap, NodeState};
//!
//! let map = Mindmap::new();
//! let mut head = map.create_node("draft").unwrap();
//! let mut child = head.add_child("point").unwrap();
//! assert_eq!(head.state(), NodeState::DetachedHead);
//! assert_eq!(child.parent(), Some(head.clone()));
//!
//! let mut root = map.rootnode();
//! assert!(root.attach(&mut head, None));
//! child.resolve();
//! assert_eq!(child.state(), NodeState::Attached);
//! assert!(map.check_parent_map().is_empty());
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `freeplane` command line tool

pub mod branch;
pub mod codec;
pub mod config;
pub mod element;
pub mod error;
pub mod ident;
pub mod mindmap;
pub mod node;
pub mod parentmap;
pub mod properties;
pub mod query;
#[cfg(test)]
mod tests;
pub mod text;

pub use branch::Branch;
pub use config::MindmapConfig;
pub use element::Element;
pub use error::*;
pub use ident::IdAllocator;
pub use mindmap::Mindmap;
pub use node::{ArrowLinkRef, NewNode, Node};
pub use properties::{ArrowLinkSettings, ArrowStyles, NodeState, StyleSettings};
pub use query::NodeFilter;
