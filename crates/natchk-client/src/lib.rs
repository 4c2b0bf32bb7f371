#![forbid(unsafe_code)]

//! Library half of the natchk classification client: the probe task family
//! and the classifier decision tree. `src/main.rs` is a thin CLI shell
//! around [`classifier::classify`].

pub mod classifier;
pub mod probe;
