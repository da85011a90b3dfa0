pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod schemas;
