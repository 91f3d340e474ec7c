pub mod accounts;
pub mod calc;
pub mod config;
pub mod forecast;
pub mod output;
pub mod project;
pub mod report;
pub mod server;
pub mod store;
