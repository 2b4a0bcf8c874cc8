// src/lib.rs

//! Listing extraction and deduplication for real-estate channel posts.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
