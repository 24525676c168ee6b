pub mod opt;
pub mod session;
