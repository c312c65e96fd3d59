//! Wire document model for the arbor activity bus.
//!
//! Everything addressable in arbor is an [`Object`]: plain documents,
//! activities, collections and collection pages all share one flat wire
//! shape and are told apart by their type labels. Reference-valued fields
//! hold [`Node`]s (an identifier string or an inline document) and follow
//! the scalar/list wire contract implemented in [`wire`].

pub mod address;
pub mod node;
pub mod object;
pub mod wire;

pub use node::{contains_id, first_id, gather_ids, is_public, Node};
pub use object::Object;
