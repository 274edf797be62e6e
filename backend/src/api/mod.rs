pub mod auth;
pub mod books;
pub mod error;
pub mod rest;
pub mod search;
pub mod server;
pub mod session;
pub mod views;
