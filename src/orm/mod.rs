pub mod access_requests;
pub mod audit_logs;
pub mod deletion_requests;
pub mod garrisons;
pub mod infraction_deletions;
pub mod infractions;
pub mod sessions;
pub mod setting_history;
pub mod settings;
pub mod user_roles;
pub mod users;
