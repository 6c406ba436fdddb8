pub mod api;
pub mod client;
pub mod config;
pub mod cookies;
pub mod fetcher;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod service;
pub mod status;
pub mod storage;
pub mod worker;
