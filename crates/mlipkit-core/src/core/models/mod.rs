pub mod properties;
pub mod structure;
