//! Memory Signals
//!
//! Signals that retain state so a late subscriber is caught up
//! synchronously, inside `subscribe`, with no publish required.
//!
//! | Type | Retains | Dedup | On subscribe |
//! |---|---|---|---|
//! | [`LatestValue`] | one value | [`Dedup`] types only | replay the value |
//! | [`LatestValueMulti`] | every value, in order | no | replay the log |
//! | [`LatestLifetime`] | one lifetime | same instance | replay if active |
//! | [`LifetimeSet`] | a set of lifetimes | set semantics | replay all active |
//!
//! The two lifetime-bearing variants are `tmps_only`: they watch the end of
//! every lifetime they hold and drop it from their state when it ends.

mod latest;
mod latest_lifetime;
mod lifetime_set;
mod multi;

pub use latest::{Dedup, LatestValue};
pub use latest_lifetime::LatestLifetime;
pub use lifetime_set::LifetimeSet;
pub use multi::LatestValueMulti;
