mod catalog;
mod simulated_provider;

pub use catalog::*;
pub use simulated_provider::*;
