pub mod commands;
pub mod diff;
pub mod monitor;
pub mod ports;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod usecases;

pub use commands::*;
pub use diff::*;
pub use monitor::*;
pub use ports::*;
pub use scheduler::*;
pub use session::*;
pub use state::*;
pub use supervisor::*;
