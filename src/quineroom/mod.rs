// src/quineroom/mod.rs

pub mod agent;
pub mod checks;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod convergence;
pub mod event;
pub mod http_client_pool;
pub mod message;
pub mod room;

// Let's explicitly export Room so we don't have to access it via quineroom::room::Room
// and instead as quineroom::Room
pub use room::Room;
