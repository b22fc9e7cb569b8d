pub mod calibration;
pub mod error;
pub mod gamma;
pub mod maps;
pub mod models;
pub mod newick;
pub mod partition;
pub mod patterns;
