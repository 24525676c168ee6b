pub mod io;
pub mod kwargs;
pub mod models;
