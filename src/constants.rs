//! Application-wide constants
//!
//! Policy defaults live here; the runtime values may be overridden through
//! the settings table (see crate::config).

/// Default number of infractions a member may have deleted per calendar day.
/// Counted against completed deletions, not pending requests. Override with
/// the `daily_deletion_limit` setting.
pub const DEFAULT_DAILY_DELETION_LIMIT: i64 = 3;

/// Default retention window, in hours, for deletion history (deletion log
/// rows and their DELETE/CLEANUP audit entries). Override with the
/// `deletion_retention_hours` setting.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Default lifetime, in hours, of a pending deletion request before the
/// expiry sweep reclaims it. Override with the `deletion_request_ttl_hours`
/// setting.
pub const DEFAULT_REQUEST_TTL_HOURS: i64 = 72;

/// Default pause between background maintenance sweeps, in seconds.
/// Override with the `cleanup_interval_secs` setting.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: i64 = 3600;

/// Display name used for requests without an authenticated user.
pub const GUEST_USERNAME: &str = "Guest";

/// Punishment types offered on the registration form. Stored verbatim on the
/// infraction row; the corregedoria works in Portuguese.
pub const PUNISHMENT_TYPES: [&str; 10] = [
    "Advertência Verbal",
    "Advertência Escrita",
    "Repreensão",
    "Suspensão de 1 dia",
    "Suspensão de 3 dias",
    "Suspensão de 7 dias",
    "Suspensão de 15 dias",
    "Suspensão de 30 dias",
    "Demissão",
    "Punição",
];

/// Attribution name for actions taken by the background maintenance task.
pub const SYSTEM_USERNAME: &str = "system";
