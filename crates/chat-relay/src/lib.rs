//! Chat relay - forwards a browser chat conversation to a pluggable completion provider.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod llm;
pub mod relay;
pub mod response;
pub mod server;
