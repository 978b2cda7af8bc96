//! Static data tables

pub mod symbols;
