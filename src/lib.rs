pub mod buildfile;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod generate;
pub mod model;
pub mod parser;
pub mod resolver;
