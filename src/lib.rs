pub mod config;
pub mod pdg;
pub mod tables;
pub mod truth;
pub mod matching;
pub mod wcombo;
pub mod selection;
pub mod io;
pub mod export;
pub mod utils;

pub type BoxErr<T> = Result<T, Box<dyn std::error::Error>>;
