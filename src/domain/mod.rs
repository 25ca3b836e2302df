pub mod types;
pub mod event;
pub mod snapshot;
pub mod policy;
pub mod command;

pub use types::*;
pub use event::*;
pub use snapshot::*;
pub use policy::*;
pub use command::*;
