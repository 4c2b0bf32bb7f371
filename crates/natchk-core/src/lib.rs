#![forbid(unsafe_code)]

//! Shared types for the natchk NAT classifier: the wire codec, the
//! `Endpoint`/`ServerList`/`Verdict` value types, error handling, and local
//! interface enumeration.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod iface;
pub mod server_list;
pub mod verdict;

pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use server_list::ServerList;
pub use verdict::Verdict;
