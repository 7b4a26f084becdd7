pub mod problem;
pub mod success;
