pub mod single_point;
