pub mod analyzer;
pub mod comments;
pub mod config;
pub mod controller;
pub mod executor;
pub mod rpc_executor;
pub mod sentiment;
pub mod simulator;
pub mod snippet;
pub mod tx_log;
pub mod types;
pub mod validation;
