//! Process exit statuses of the `waypoint` binary.
//!
//! `serve` exits with [`OK`] at end of input even when individual requests
//! failed; those failures travel in the replies instead.

pub const OK: i32 = 0;
/// Bad arguments, an unreadable or invalid declaration, a broken
/// `.waypoint/` layout, or `status` for a journey with no record.
pub const INVALID: i32 = 1;
/// `status` found a journey whose last piece has been served.
pub const COMPLETE: i32 = 2;
