#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod projection;
pub mod quantity;
pub mod rate;
pub mod tariff;
pub mod usage;
pub mod window;
