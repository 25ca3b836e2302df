pub mod handle_diff;
pub mod run_cycle;

pub use handle_diff::*;
pub use run_cycle::*;
