//! Shared helpers for the unit tests of this crate.
