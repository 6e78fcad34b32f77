pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod stats;
