//! Stream tags for [`crate::rng::stream_key`].
//!
//! Each derivation keys its numbers with its own tag first, so no two
//! derivations ever read the same stream. Changing a tag changes every
//! descriptor produced from a seed.

pub const PD: u64 = 1;
pub const CD: u64 = 2;
pub const CD_POSITION: u64 = 3;
pub const RANDOM_CD: u64 = 4;
pub const MODIFICATIONS: u64 = 5;
pub const OPERATIONS: u64 = 6;
pub const OPERATION_KIND: u64 = 7;
pub const VD: u64 = 8;
pub const SD: u64 = 9;
pub const COLUMN_MASK: u64 = 10;
pub const RANGE: u64 = 11;
pub const QUERY: u64 = 12;
