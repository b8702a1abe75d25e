//! Fixed-window rate limiting over the key-value store
//!
//! Each caller identity owns one `rl:{identity}` entry holding the number of
//! admitted requests and the instant its window closes. The window boundary
//! lives in the value; the store TTL only cleans up idle entries.
//!
//! Decision table for one check:
//!
//! | stored state                    | tentative count | window end            |
//! |---------------------------------|-----------------|-----------------------|
//! | absent or malformed             | 1               | now + window          |
//! | valid, `resetAt <= now`         | 1               | now + window          |
//! | valid, `resetAt > now`          | stored + 1      | stored `resetAt`      |
//!
//! The tentative state is written back only when it is admitted, so a flood
//! of denied requests can never move the window. Store errors are returned to
//! the caller, which fails open.

pub mod limiter;

pub use limiter::{RateLimitDecision, RateLimitState, RateLimiter};
