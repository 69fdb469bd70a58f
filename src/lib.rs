pub mod access_token;
pub mod availability;
pub mod backend;
pub mod booking;
pub mod config;
pub mod error;
pub mod range;
pub mod repository;
pub mod submission;
pub mod web;
