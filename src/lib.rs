pub mod config;
pub mod logging;
pub mod output;
pub mod property;
pub mod ranking;
pub mod rescore;
pub mod scoring;
pub mod service;
pub mod weights;
