//! Command implementations.

mod info;
mod run;
mod validate;
mod wait;

pub use info::run_info;
pub use run::run_notifier;
pub use validate::run_validate;
pub use wait::run_wait;
