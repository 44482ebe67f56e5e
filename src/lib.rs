pub mod cli;
pub mod config;
pub mod liveness;
pub mod master;
pub mod pidfiles;
pub mod reload;
pub mod signals;
