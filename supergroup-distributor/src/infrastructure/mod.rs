pub mod auth;
pub mod database;
pub mod http;
pub mod persistence;
pub mod retry;
