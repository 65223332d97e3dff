pub mod config;
pub mod http;
pub mod repositories;
pub mod visitor;
