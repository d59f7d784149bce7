#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod crossref;
pub mod fetch;
pub mod filter;
pub mod formats;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod normalize;
pub mod pacer;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod tracker;
