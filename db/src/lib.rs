pub mod grove_engine;
pub mod protocol;
pub mod utils;

extern crate self as grove_db;
