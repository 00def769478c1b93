pub mod common;
pub mod progress;

pub mod a001_objective;
pub mod a002_key_result;
