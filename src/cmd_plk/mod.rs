//! Subcommand modules for the `plk` binary.

pub mod calibrate;
pub mod gamma;
pub mod loglik;
pub mod models;
pub mod pmatrix;

use plk::libs::models::EmpiricalModel;
use std::io::Read;

/// Reads a PAML `.dat` model, named after the file stem.
pub fn read_dat(infile: &str) -> anyhow::Result<EmpiricalModel> {
    let mut text = String::new();
    intspan::reader(infile).read_to_string(&mut text)?;
    let name = std::path::Path::new(infile)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(infile);
    Ok(EmpiricalModel::from_paml(name, &text)?)
}
