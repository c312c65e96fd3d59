//! Identity-scoped access to the document graph.
//!
//! The [`Bus`] resolves addresses to documents and enforces hierarchical
//! access control; the [`Worker`] turns submitted activities into durable
//! side effects by dispatching them through an explicit [`RuleRegistry`].
//! Both take their [`Store`](arbor_store::Store) by injection.

pub mod bus;
pub mod error;
pub mod rules;
pub mod stock;
pub mod worker;

#[cfg(test)]
mod tests;

pub use bus::{Bus, SYS_IDENTITY};
pub use error::{BusError, Result};
pub use rules::{Add, Create, Rule, RuleRegistry};
pub use worker::{Hooks, Worker};
