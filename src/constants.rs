/// Application-wide constants
/// All magic numbers and constant values should be defined here

/// Permitted snippet lifetimes, in days
pub const PERMITTED_EXPIRY_DAYS: [i64; 3] = [1, 7, 365];

/// Lifetime pre-selected in the create form, in days
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

/// Number of snippets shown on the home page
pub const LATEST_SNIPPETS_LIMIT: i64 = 10;

/// Maximum snippet title length in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Minimum password length in characters
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Cleanup task interval in seconds (1 hour)
pub const CLEANUP_INTERVAL_SECS: u64 = 3600;
