//! Datatypes shared across resources

pub mod complex;
