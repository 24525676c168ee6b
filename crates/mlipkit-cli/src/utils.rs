pub mod kwargs;
pub mod progress;
