use super::Partition;
use crate::libs::error::Result;
use itertools::Itertools;

impl Partition {
    /// Render every matrix of `slot`, one row per line, a blank line between
    /// matrices. Matrices are ordered by model, then category.
    pub fn show_pmatrix(&self, slot: usize, precision: usize) -> Result<String> {
        let values = self.prob_matrix(slot)?;
        let s = self.dims.states;

        let mut out = String::new();
        for (k, matrix) in values.chunks(s * s).enumerate() {
            if k > 0 {
                out.push('\n');
            }
            for row in matrix.chunks(s) {
                let line = row
                    .iter()
                    .map(|v| format!("{:+.*}", precision, v))
                    .join(" ");
                out.push_str(&line);
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Render a buffer as `[ ((c0) (c1)) ((c0) (c1)) ]`, one group per site.
    /// Internal buffers carry their scaler as `:n` when non-zero.
    pub fn show_clv(&self, buffer: usize, precision: usize) -> Result<String> {
        let values = self.clv(buffer)?;
        let scalers = self.scalers(buffer)?;
        let s = self.dims.states;

        let mut out = String::from("[");
        for (site, block) in values.chunks(self.dims.rate_cats * s).enumerate() {
            out.push_str(" (");
            let cats = block
                .chunks(s)
                .map(|cat| {
                    let inner = cat
                        .iter()
                        .map(|v| format!("{:.*}", precision, v))
                        .join(" ");
                    format!("({})", inner)
                })
                .join(" ");
            out.push_str(&cats);
            out.push(')');
            if scalers[site] > 0 {
                out.push_str(&format!(":{}", scalers[site]));
            }
        }
        out.push_str(" ]");
        Ok(out)
    }
}
