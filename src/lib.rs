pub mod access;
pub mod app_config;
pub mod audit;
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod create_user;
pub mod db;
pub mod deletions;
pub mod garrisons;
pub mod infractions;
pub mod middleware;
pub mod orm;
pub mod role;
pub mod session;
pub mod user;
pub mod web;
