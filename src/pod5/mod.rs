//! Tools that work on POD5 read tables.
pub mod filter_read_ids;
