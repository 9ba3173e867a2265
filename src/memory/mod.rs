//! Virtual memory for address-stable tables.
//!
//! - [`page::PageMapper`] - Collaborator interface for reserving and committing pages
//! - [`page::SystemPages`] - Default mapper on top of anonymous memory mappings
//! - [`arena::VirtualArena`] - Reserve-once, commit-as-you-grow region with a fixed base

pub mod arena;
pub mod page;

pub use arena::VirtualArena;
pub use page::{PageMapper, PageRange, SystemPages};
