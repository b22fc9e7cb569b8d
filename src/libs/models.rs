//! Empirical amino acid replacement models.
//!
//! Plain data: 190 exchangeabilities (upper triangle of the symmetric 20x20
//! matrix, row-major, diagonal excluded) and 20 equilibrium frequencies, both
//! in [`AA_ORDER`](crate::libs::maps::AA_ORDER). A partition receives them
//! through `set_subst_params` / `set_frequencies` and knows nothing about
//! their names.
//!
//! Built-in tables are kept exactly as PAML distributes them (`dayhoff.dat`,
//! `lg.dat`, `jones.dat`, `wag.dat`): the lower triangle row by row, B-A, then
//! C-A C-B, and so on. [`from_lower_triangle`] turns that into the layout above.
//! Any other model in the same format is read with [`EmpiricalModel::from_paml`].

use crate::libs::error::{PartitionError, Result};
use std::fmt;
use std::str::FromStr;

/// Number of exchangeabilities of a 20-state reversible model.
pub const AA_RATES: usize = 190;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProteinModel {
    Dayhoff,
    Lg,
    Jtt,
    Wag,
}

impl ProteinModel {
    /// Every model of the registry, in display order.
    pub const ALL: [ProteinModel; 4] = [
        ProteinModel::Dayhoff,
        ProteinModel::Lg,
        ProteinModel::Jtt,
        ProteinModel::Wag,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProteinModel::Dayhoff => "Dayhoff",
            ProteinModel::Lg => "LG",
            ProteinModel::Jtt => "JTT",
            ProteinModel::Wag => "WAG",
        }
    }

    /// Case-insensitive lookup.
    ///
    /// ```
    /// use plk::libs::models::ProteinModel;
    ///
    /// assert_eq!(ProteinModel::from_name("wag"), Some(ProteinModel::Wag));
    /// assert_eq!(ProteinModel::from_name("GTR"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub fn exchangeabilities(&self) -> &'static [f64; AA_RATES] {
        match self {
            ProteinModel::Dayhoff => &DAYHOFF_RATES,
            ProteinModel::Lg => &LG_RATES,
            ProteinModel::Jtt => &JTT_RATES,
            ProteinModel::Wag => &WAG_RATES,
        }
    }

    pub fn frequencies(&self) -> &'static [f64; 20] {
        match self {
            ProteinModel::Dayhoff => &DAYHOFF_FREQS,
            ProteinModel::Lg => &LG_FREQS,
            ProteinModel::Jtt => &JTT_FREQS,
            ProteinModel::Wag => &WAG_FREQS,
        }
    }

    /// Publication the tables come from
    pub fn reference(&self) -> &'static str {
        match self {
            ProteinModel::Dayhoff => "Dayhoff, Schwartz & Orcutt (1978)",
            ProteinModel::Lg => "Le & Gascuel (2008)",
            ProteinModel::Jtt => "Jones, Taylor & Thornton (1992)",
            ProteinModel::Wag => "Whelan & Goldman (2001)",
        }
    }
}

impl fmt::Display for ProteinModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProteinModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown protein model '{}', expected one of: {}",
                s,
                Self::ALL.map(|m| m.name()).join(", ")
            )
        })
    }
}

/// A named set of tables, built in or read from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalModel {
    pub name: String,
    /// Upper triangle, row-major
    pub exchangeabilities: Vec<f64>,
    pub frequencies: Vec<f64>,
}

impl EmpiricalModel {
    /// Read a PAML-style amino acid model: 190 exchangeabilities as a lower
    /// triangle, then 20 frequencies. Anything after the 210th number is
    /// ignored, as PAML files carry notes there.
    ///
    /// ```
    /// use plk::libs::models::{EmpiricalModel, ProteinModel};
    ///
    /// let mut text = String::new();
    /// for row in 1..20 {
    ///     text += &vec!["1"; row].join(" ");
    ///     text += "\n";
    /// }
    /// text += &vec!["0.05"; 20].join(" ");
    /// text += "\n\nPoisson";
    ///
    /// let model = EmpiricalModel::from_paml("poisson", &text).unwrap();
    /// assert!(model.exchangeabilities.iter().all(|&r| r == 1.0));
    /// assert_eq!(model.frequencies.len(), 20);
    /// ```
    pub fn from_paml(name: &str, text: &str) -> Result<Self> {
        let mut values = Vec::with_capacity(AA_RATES + 20);
        for token in text.split_whitespace().take(AA_RATES + 20) {
            let value = token.parse::<f64>().map_err(|_| {
                PartitionError::InvalidArgument(format!(
                    "{}: '{}' is not a number (value {} of {})",
                    name,
                    token,
                    values.len() + 1,
                    AA_RATES + 20
                ))
            })?;
            values.push(value);
        }
        if values.len() < AA_RATES + 20 {
            return Err(PartitionError::InvalidArgument(format!(
                "{}: expected {} values, found {}",
                name,
                AA_RATES + 20,
                values.len()
            )));
        }

        let mut lower = [0.0; AA_RATES];
        lower.copy_from_slice(&values[..AA_RATES]);
        Ok(EmpiricalModel {
            name: name.to_string(),
            exchangeabilities: from_lower_triangle(lower).to_vec(),
            frequencies: values[AA_RATES..].to_vec(),
        })
    }
}

impl From<ProteinModel> for EmpiricalModel {
    fn from(model: ProteinModel) -> Self {
        EmpiricalModel {
            name: model.name().to_string(),
            exchangeabilities: model.exchangeabilities().to_vec(),
            frequencies: model.frequencies().to_vec(),
        }
    }
}

/// Reorder a PAML lower triangle (row i holds pairs (i, 0..i)) into the
/// upper-triangle row-major layout, where pair (a, b), a < b, sits at
/// `a * (39 - a) / 2 + (b - a - 1)`.
pub const fn from_lower_triangle(lower: [f64; AA_RATES]) -> [f64; AA_RATES] {
    let mut upper = [0.0; AA_RATES];
    let mut i = 1;
    while i < 20 {
        let mut j = 0;
        while j < i {
            upper[j * (39 - j) / 2 + (i - j - 1)] = lower[i * (i - 1) / 2 + j];
            j += 1;
        }
        i += 1;
    }
    upper
}

// dayhoff.dat
#[rustfmt::skip]
const DAYHOFF_LOWER: [f64; AA_RATES] = [
    27.0,
    98.0, 32.0,
    120.0, 0.0, 905.0,
    36.0, 23.0, 0.0, 0.0,
    89.0, 246.0, 103.0, 134.0, 0.0,
    198.0, 1.0, 148.0, 1153.0, 0.0, 716.0,
    240.0, 9.0, 139.0, 125.0, 11.0, 28.0, 81.0,
    23.0, 240.0, 535.0, 86.0, 28.0, 606.0, 43.0, 10.0,
    65.0, 64.0, 77.0, 24.0, 44.0, 18.0, 61.0, 0.0, 7.0,
    41.0, 15.0, 34.0, 0.0, 0.0, 73.0, 11.0, 7.0, 44.0, 257.0,
    26.0, 464.0, 318.0, 71.0, 0.0, 153.0, 83.0, 27.0, 26.0, 46.0, 18.0,
    72.0, 90.0, 1.0, 0.0, 0.0, 114.0, 30.0, 17.0, 0.0, 336.0, 527.0, 243.0,
    18.0, 14.0, 14.0, 0.0, 0.0, 0.0, 0.0, 15.0, 48.0, 196.0, 157.0, 0.0, 92.0,
    250.0, 103.0, 42.0, 13.0, 19.0, 153.0, 51.0, 34.0, 94.0, 12.0, 32.0, 33.0, 17.0, 11.0,
    409.0, 154.0, 495.0, 95.0, 161.0, 56.0, 79.0, 234.0, 35.0, 24.0, 17.0, 96.0, 62.0, 46.0, 245.0,
    371.0, 26.0, 229.0, 66.0, 16.0, 53.0, 34.0, 30.0, 22.0, 192.0, 33.0, 136.0, 104.0, 13.0, 78.0, 550.0,
    0.0, 201.0, 23.0, 0.0, 0.0, 0.0, 0.0, 0.0, 27.0, 0.0, 46.0, 0.0, 0.0, 76.0, 0.0, 75.0, 0.0,
    24.0, 8.0, 95.0, 0.0, 96.0, 0.0, 22.0, 0.0, 127.0, 37.0, 28.0, 13.0, 0.0, 698.0, 0.0, 34.0, 42.0, 61.0,
    208.0, 24.0, 15.0, 18.0, 49.0, 35.0, 37.0, 54.0, 44.0, 889.0, 175.0, 10.0, 258.0, 12.0, 48.0, 30.0, 157.0, 0.0, 28.0,
];

static DAYHOFF_RATES: [f64; AA_RATES] = from_lower_triangle(DAYHOFF_LOWER);

static DAYHOFF_FREQS: [f64; 20] = [
    0.087127, 0.040904, 0.040432, 0.046872, 0.033474,
    0.038255, 0.049530, 0.088612, 0.033618, 0.036886,
    0.085357, 0.080482, 0.014753, 0.039772, 0.050680,
    0.069577, 0.058542, 0.010494, 0.029916, 0.064718,
];

// lg.dat
#[rustfmt::skip]
const LG_LOWER: [f64; AA_RATES] = [
    0.425093,
    0.276818, 0.751878,
    0.395144, 0.123954, 5.076149,
    2.489084, 0.534551, 0.528768, 0.062556,
    0.969894, 2.807908, 1.695752, 0.523386, 0.084808,
    1.038545, 0.363970, 0.541712, 5.243870, 0.003499, 4.128591,
    2.066040, 0.390192, 1.437645, 0.844926, 0.569265, 0.267959, 0.348847,
    0.358858, 2.426601, 4.509238, 0.927114, 0.640543, 4.813505, 0.423881, 0.311484,
    0.149830, 0.126991, 0.191503, 0.010690, 0.320627, 0.072854, 0.044265, 0.008705, 0.108882,
    0.395337, 0.301848, 0.068427, 0.015076, 0.594007, 0.582457, 0.069673, 0.044261, 0.366317, 4.145067,
    0.536518, 6.326067, 2.145078, 0.282959, 0.013266, 3.234294, 1.807177, 0.296636, 0.697264, 0.159069, 0.137500,
    1.124035, 0.484133, 0.371004, 0.025548, 0.893680, 1.672569, 0.173735, 0.139538, 0.442472, 4.273607, 6.312358, 0.656604,
    0.253701, 0.052722, 0.089525, 0.017416, 1.105251, 0.035855, 0.018811, 0.089586, 0.682139, 1.112727, 2.592692, 0.023918, 1.798853,
    1.177651, 0.332533, 0.161787, 0.394456, 0.075382, 0.624294, 0.419409, 0.196961, 0.508851, 0.078281, 0.249060, 0.390322, 0.099849, 0.094464,
    4.727182, 0.858151, 4.008358, 1.240275, 2.784478, 1.223828, 0.611973, 1.739990, 0.990012, 0.064105, 0.182287, 0.748683, 0.346960, 0.361819, 1.338132,
    2.139501, 0.578987, 2.000679, 0.425860, 1.143480, 1.080136, 0.604545, 0.129836, 0.584262, 1.033739, 0.302936, 1.136863, 2.020366, 0.165001, 0.571468, 6.472279,
    0.180717, 0.593607, 0.045376, 0.029890, 0.670128, 0.236199, 0.077852, 0.268491, 0.597054, 0.111660, 0.619632, 0.049906, 0.696175, 2.457121, 0.095131, 0.248862, 0.140825,
    0.218959, 0.314440, 0.612025, 0.135107, 1.165532, 0.257336, 0.120037, 0.054679, 5.306834, 0.232523, 0.299648, 0.131932, 0.481306, 7.803902, 0.089613, 0.400547, 0.245841, 3.151815,
    2.547870, 0.170887, 0.083688, 0.037967, 1.959291, 0.210332, 0.245034, 0.076701, 0.119013, 10.649107, 1.702745, 0.185202, 1.898718, 0.654683, 0.296501, 0.098369, 2.188158, 0.189510, 0.249313,
];

static LG_RATES: [f64; AA_RATES] = from_lower_triangle(LG_LOWER);

static LG_FREQS: [f64; 20] = [
    0.079066, 0.055941, 0.041977, 0.053052, 0.012937,
    0.040767, 0.071586, 0.057337, 0.022355, 0.062157,
    0.099081, 0.064600, 0.022951, 0.042302, 0.044040,
    0.061197, 0.053287, 0.012066, 0.034155, 0.069147,
];

// jones.dat
#[rustfmt::skip]
const JTT_LOWER: [f64; AA_RATES] = [
    58.0,
    54.0, 45.0,
    81.0, 16.0, 528.0,
    56.0, 113.0, 34.0, 10.0,
    57.0, 310.0, 86.0, 49.0, 9.0,
    105.0, 29.0, 58.0, 767.0, 5.0, 323.0,
    179.0, 137.0, 81.0, 130.0, 59.0, 26.0, 119.0,
    27.0, 328.0, 391.0, 112.0, 69.0, 597.0, 26.0, 23.0,
    36.0, 22.0, 47.0, 11.0, 17.0, 9.0, 12.0, 6.0, 16.0,
    30.0, 38.0, 12.0, 7.0, 23.0, 72.0, 9.0, 6.0, 56.0, 229.0,
    35.0, 646.0, 263.0, 26.0, 7.0, 292.0, 181.0, 27.0, 45.0, 21.0, 14.0,
    54.0, 44.0, 30.0, 15.0, 31.0, 43.0, 18.0, 14.0, 33.0, 479.0, 388.0, 65.0,
    15.0, 5.0, 10.0, 4.0, 78.0, 4.0, 5.0, 5.0, 40.0, 89.0, 248.0, 4.0, 43.0,
    194.0, 74.0, 15.0, 15.0, 14.0, 164.0, 18.0, 24.0, 115.0, 10.0, 102.0, 21.0, 16.0, 17.0,
    378.0, 101.0, 503.0, 59.0, 223.0, 53.0, 30.0, 201.0, 73.0, 40.0, 59.0, 47.0, 29.0, 92.0, 285.0,
    475.0, 64.0, 232.0, 38.0, 42.0, 51.0, 32.0, 33.0, 46.0, 245.0, 25.0, 103.0, 226.0, 12.0, 118.0, 477.0,
    9.0, 126.0, 8.0, 4.0, 115.0, 18.0, 10.0, 55.0, 8.0, 9.0, 52.0, 10.0, 24.0, 53.0, 6.0, 35.0, 12.0,
    11.0, 20.0, 70.0, 46.0, 209.0, 24.0, 7.0, 8.0, 573.0, 32.0, 24.0, 8.0, 18.0, 536.0, 10.0, 63.0, 21.0, 71.0,
    298.0, 17.0, 16.0, 31.0, 62.0, 20.0, 45.0, 47.0, 11.0, 961.0, 180.0, 14.0, 323.0, 62.0, 23.0, 38.0, 112.0, 25.0, 16.0,
];

static JTT_RATES: [f64; AA_RATES] = from_lower_triangle(JTT_LOWER);

static JTT_FREQS: [f64; 20] = [
    0.076748, 0.051691, 0.042645, 0.051544, 0.019803,
    0.040752, 0.061830, 0.073152, 0.022944, 0.053761,
    0.091904, 0.058676, 0.023826, 0.040126, 0.050901,
    0.068765, 0.058565, 0.014261, 0.032102, 0.066005,
];

// wag.dat
#[rustfmt::skip]
const WAG_LOWER: [f64; AA_RATES] = [
    0.551571,
    0.509848, 0.635346,
    0.738998, 0.147304, 5.429420,
    1.027040, 0.528191, 0.265256, 0.0302949,
    0.908598, 3.035500, 1.543640, 0.616783, 0.0988179,
    1.582850, 0.439157, 0.947198, 6.174160, 0.021352, 5.469470,
    1.416720, 0.584665, 1.125560, 0.865584, 0.306674, 0.330052, 0.567717,
    0.316954, 2.137150, 3.956290, 0.930676, 0.248972, 4.294110, 0.570025, 0.249410,
    0.193335, 0.186979, 0.554236, 0.039437, 0.170135, 0.113917, 0.127395, 0.0304501, 0.138190,
    0.397915, 0.497671, 0.131528, 0.0848047, 0.384287, 0.869489, 0.154263, 0.0613037, 0.499462, 3.170970,
    0.906265, 5.351420, 3.012010, 0.479855, 0.0740339, 3.894900, 2.584430, 0.373558, 0.890432, 0.323832, 0.257555,
    0.893496, 0.683162, 0.198221, 0.103754, 0.390482, 1.545260, 0.315124, 0.174100, 0.404141, 4.257460, 4.854020, 0.934276,
    0.210494, 0.102711, 0.0961621, 0.0467304, 0.398020, 0.0999208, 0.0811339, 0.049931, 0.679371, 1.059470, 2.115170, 0.088836, 1.190630,
    1.438550, 0.679489, 0.195081, 0.423984, 0.109404, 0.933372, 0.682355, 0.243570, 0.696198, 0.0999288, 0.415844, 0.556896, 0.171329, 0.161444,
    3.370790, 1.224190, 3.974230, 1.071760, 1.407660, 1.028870, 0.704939, 1.341820, 0.740169, 0.319440, 0.344739, 0.967130, 0.493905, 0.545931, 1.613280,
    2.121110, 0.554413, 2.030060, 0.374866, 0.512984, 0.857928, 0.822765, 0.225833, 0.473307, 1.458160, 0.326622, 1.386980, 1.516120, 0.171903, 0.795384, 4.378020,
    0.113133, 1.163920, 0.0719167, 0.129767, 0.717070, 0.215737, 0.156557, 0.336983, 0.262569, 0.212483, 0.665309, 0.137505, 0.515706, 1.529640, 0.139405, 0.523742, 0.110864,
    0.240735, 0.381533, 1.086000, 0.325711, 0.543833, 0.227710, 0.196303, 0.103604, 3.873440, 0.420170, 0.398618, 0.133264, 0.428437, 6.454280, 0.216046, 0.786993, 0.291148, 2.485390,
    2.006010, 0.251849, 0.196246, 0.152335, 1.002140, 0.301281, 0.588731, 0.187247, 0.118358, 7.821300, 1.800340, 0.305434, 2.058450, 0.649892, 0.314887, 0.232739, 1.388230, 0.365369, 0.314730,
];

static WAG_RATES: [f64; AA_RATES] = from_lower_triangle(WAG_LOWER);

static WAG_FREQS: [f64; 20] = [
    0.0866279, 0.043972, 0.0390894, 0.0570451, 0.0193078,
    0.0367281, 0.0580589, 0.0832518, 0.0244313, 0.048466,
    0.086209, 0.0620286, 0.0195027, 0.0384319, 0.0457631,
    0.0695179, 0.0610127, 0.0143859, 0.0352742, 0.0708956,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::maps::AA_ORDER;

    // exchangeability between residues `a` and `b`
    fn rate(model: ProteinModel, a: u8, b: u8) -> f64 {
        let i = AA_ORDER.iter().position(|&c| c == a).unwrap();
        let j = AA_ORDER.iter().position(|&c| c == b).unwrap();
        let (i, j) = (i.min(j), i.max(j));
        model.exchangeabilities()[i * (39 - i) / 2 + (j - i - 1)]
    }

    #[test]
    fn names_round_trip() {
        for model in ProteinModel::ALL {
            assert_eq!(ProteinModel::from_name(model.name()), Some(model));
            assert_eq!(model.to_string().parse::<ProteinModel>(), Ok(model));
        }
        assert_eq!("lg".parse::<ProteinModel>(), Ok(ProteinModel::Lg));
        assert!("JTT-DCMut".parse::<ProteinModel>().is_err());
    }

    #[test]
    fn tables_are_sane() {
        for model in ProteinModel::ALL {
            let rates = model.exchangeabilities();
            assert!(rates.iter().all(|&r| r >= 0.0 && r.is_finite()));
            assert!(rates.iter().filter(|&&r| r > 0.0).count() > 150);

            let sum: f64 = model.frequencies().iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "{} sums to {}", model, sum);
        }
    }

    #[test]
    fn published_entries() {
        let cases = [
            (ProteinModel::Wag, b'A', b'R', 0.551571),
            (ProteinModel::Wag, b'A', b'Q', 0.908598),
            (ProteinModel::Wag, b'N', b'D', 5.429420),
            (ProteinModel::Wag, b'D', b'E', 6.174160),
            (ProteinModel::Wag, b'W', b'Y', 2.485390),
            (ProteinModel::Wag, b'I', b'V', 7.821300),
            (ProteinModel::Lg, b'A', b'R', 0.425093),
            (ProteinModel::Lg, b'N', b'D', 5.076149),
            (ProteinModel::Lg, b'F', b'Y', 7.803902),
            (ProteinModel::Lg, b'I', b'V', 10.649107),
            (ProteinModel::Jtt, b'A', b'R', 58.0),
            (ProteinModel::Jtt, b'D', b'E', 767.0),
            (ProteinModel::Jtt, b'R', b'K', 646.0),
            (ProteinModel::Jtt, b'I', b'V', 961.0),
            (ProteinModel::Dayhoff, b'A', b'R', 27.0),
            (ProteinModel::Dayhoff, b'D', b'E', 1153.0),
            (ProteinModel::Dayhoff, b'A', b'W', 0.0),
            (ProteinModel::Dayhoff, b'I', b'V', 889.0),
        ];
        for (model, a, b, expected) in cases {
            assert_eq!(rate(model, a, b), expected, "{} {}-{}", model, a as char, b as char);
            assert_eq!(rate(model, b, a), expected);
        }

        assert_eq!(ProteinModel::Wag.frequencies()[0], 0.0866279);
        assert_eq!(ProteinModel::Lg.frequencies()[10], 0.099081);
    }

    #[test]
    fn models_differ() {
        let wag = ProteinModel::Wag.exchangeabilities();
        let lg = ProteinModel::Lg.exchangeabilities();
        assert_eq!(wag.iter().filter(|r| lg.contains(r)).count(), 0);
        assert_ne!(ProteinModel::Lg.frequencies(), ProteinModel::Wag.frequencies());
    }

    #[test]
    fn lower_triangle_order() {
        let lower: [f64; AA_RATES] = std::array::from_fn(|k| k as f64);
        let upper = from_lower_triangle(lower);
        // first row of the upper triangle is column 0 of every lower row
        assert_eq!(&upper[..4], &[0.0, 1.0, 3.0, 6.0]);
        // the last pair (Y, V) is the last value of both
        assert_eq!(upper[AA_RATES - 1], (AA_RATES - 1) as f64);
        let mut sorted = upper.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, lower.to_vec());
    }

    #[test]
    fn reads_paml_files() {
        let mut text = String::from("\n");
        for row in 1..20 {
            let values: Vec<String> = (0..row).map(|j| format!("{}", row * 100 + j)).collect();
            text += &values.join(" ");
            text += "\n";
        }
        text += &["0.05"; 20].join(" ");
        text += "\n\nA R N D C Q E G H I L K M F P S T W Y V\n";

        let model = EmpiricalModel::from_paml("test", &text).unwrap();
        assert_eq!(model.name, "test");
        // A-R, A-N, A-D
        assert_eq!(&model.exchangeabilities[..3], &[100.0, 200.0, 300.0]);
        // R-N is row 2, column 1
        assert_eq!(model.exchangeabilities[19], 201.0);
        assert_eq!(model.frequencies, vec![0.05; 20]);

        assert!(EmpiricalModel::from_paml("short", "1 2 3").is_err());
        assert!(EmpiricalModel::from_paml("bad", &text.replace("1905", "x")).is_err());
    }

    #[test]
    fn builtin_round_trip() {
        let model = EmpiricalModel::from(ProteinModel::Jtt);
        assert_eq!(model.name, "JTT");
        assert_eq!(model.exchangeabilities, ProteinModel::Jtt.exchangeabilities().to_vec());
    }
}
