//! HTTP surface for the blossom blob server.

pub mod api;
pub mod auth;
pub mod error;
