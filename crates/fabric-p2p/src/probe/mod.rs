pub mod exchange;
pub mod peer;
