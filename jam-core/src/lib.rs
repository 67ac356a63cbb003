//! The building blocks of a jam: ranked queues of voted songs,
//! the playback provider seam, and notification rooms.

mod config;
mod provider;
mod queuing;
mod room;
mod track;
mod util;

pub use config::*;
pub use provider::*;
pub use queuing::*;
pub use room::*;
pub use track::*;
pub use util::*;
