//! Conversion core

pub mod latex2md;
