pub mod tasks;

pub mod utils;
