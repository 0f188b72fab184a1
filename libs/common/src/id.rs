use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = battle_common::id::prefixed_ulid("btl");
/// assert!(id.starts_with("btl_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const BATTLE: &str = "btl";
    pub const CONNECTION: &str = "conn";
}
