//! Variant Module
//!
//! The four key shapes a store can hold, each pairing a codec (byte layout)
//! with the lookup algorithm that layout makes cheap:
//!
//! - `state`: exact-match over hashed keys
//! - `temporal_state`: latest-at-or-before-T over hashed, versioned keys
//! - `ranged_state`: point containment over integer ranges
//! - `temporal_ranged_state`: point containment as of T over versioned ranges
//!
//! A store directory holds exactly one shape; the shape is chosen when the
//! store is opened and is not recorded on disk.

pub mod ranged_state;
pub mod state;
pub mod temporal_ranged_state;
pub mod temporal_state;

pub use ranged_state::{RangeKey, RangedStateCodec, RangedStateStore};
pub use state::{StateCodec, StateKey, StateStore};
pub use temporal_ranged_state::{
    TemporalRangeKey, TemporalRangedStateCodec, TemporalRangedStateStore,
};
pub use temporal_state::{TemporalStateCodec, TemporalStateKey, TemporalStateStore};
