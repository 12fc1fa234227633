pub mod events;
pub mod fakes;
pub mod fixtures;
pub mod harness;
pub mod server;

pub use events::*;
pub use fakes::*;
pub use harness::*;
pub use server::*;
