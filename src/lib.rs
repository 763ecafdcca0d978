pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod knapsack;
pub mod output;
pub mod query;
pub mod tui;
