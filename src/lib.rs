pub mod cli;
pub mod config;
pub mod conversation;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod utils;
