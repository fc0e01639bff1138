pub mod config;
pub mod control;
pub mod error;
pub mod node;
pub mod scheduler;
pub mod shutdown;
pub mod worker;
