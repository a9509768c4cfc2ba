pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod slots;
pub mod state;
