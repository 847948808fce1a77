#![allow(non_snake_case)]

pub mod config;
pub mod data_model;
pub mod drivers;
pub mod error;
pub mod fetch;
pub mod output;
pub mod run_logic;
pub mod sources;
pub mod storage;
pub mod utils;

pub use error::{Result, ScraperError};
