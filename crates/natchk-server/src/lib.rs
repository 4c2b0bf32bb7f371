#![forbid(unsafe_code)]

//! Library half of the natchk reflector: the stateless per-datagram
//! dispatch logic and the sibling registry. `src/main.rs` is a thin CLI
//! shell that binds sockets and wires reflectors together.

pub mod reflector;
pub mod registry;
