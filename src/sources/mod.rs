pub mod market;
pub mod reddit;
