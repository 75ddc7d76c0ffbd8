pub mod builder;
pub mod dedup;
pub mod dto;
pub mod errors;
pub mod gc;
pub mod hashing;
pub mod locks;
pub mod ports;
