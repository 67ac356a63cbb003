//! Implementations of the jam provider seams that run entirely in-process.

mod connectors;
mod providers;

pub use connectors::*;
pub use providers::*;
