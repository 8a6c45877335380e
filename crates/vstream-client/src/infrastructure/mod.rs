pub mod cache;
pub mod network;
