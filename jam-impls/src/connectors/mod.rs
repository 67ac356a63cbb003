mod simulated_connector;

pub use simulated_connector::*;
