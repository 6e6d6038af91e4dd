pub mod task;
pub mod catalog;
pub mod field;
pub mod config;
pub mod workspace;

pub use task::*;
pub use catalog::*;
pub use field::*;
pub use config::*;
pub use workspace::*;
