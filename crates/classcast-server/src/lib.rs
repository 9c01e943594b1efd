pub mod config;
pub mod handlers;
pub mod intake;
pub mod routes;
pub mod security;
pub mod state;
pub mod utils;
