pub mod analysis;
pub mod confidence;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod forecast;
pub mod indicator;
pub mod model;
pub mod operations;
pub mod outlook;
pub mod provider;
pub mod signal;
pub mod sink;
pub mod stats;
pub mod summary;
