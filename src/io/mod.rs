pub mod config_io;
pub mod lock;
pub mod store;
pub mod workspace_io;
