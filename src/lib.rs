pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod fetchers;
pub mod humanize;
pub mod invocation;
pub mod ledger;
pub mod observability;
pub mod runner;
pub mod server;
pub mod sink;

