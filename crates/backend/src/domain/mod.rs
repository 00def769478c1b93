pub mod error;
pub mod guard;

pub mod a001_objective;
pub mod a002_key_result;
