#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod genre;
pub mod inference;
pub mod metrics;
pub mod observability;
pub mod parser;
pub mod prompt;
pub mod report;
pub(crate) mod util;
