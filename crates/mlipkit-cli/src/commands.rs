pub mod geomopt;
pub mod singlepoint;
