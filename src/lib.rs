pub mod abi;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod jsonrpc;
pub mod reader;
pub mod watch;
pub mod watcher;
