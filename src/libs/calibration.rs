//! The five-taxon protein benchmark.
//!
//! 113 aligned sites, tips 0 and 1 joined first, then tip 2, with tips 3 and
//! 4 on the other side of the evaluation edge:
//!
//! ```text
//!          6 ------------ 7
//!         / \            / \
//!        5   2          3   4
//!       / \
//!      0   1
//! ```

use crate::libs::error::Result;
use crate::libs::gamma::compute_gamma_categories;
use crate::libs::maps::StateMap;
use crate::libs::models::EmpiricalModel;
use crate::libs::partition::{Attributes, Dimensions, Operation, Partition};

pub const ALPHA: f64 = 1.0;
pub const RATE_CATS: usize = 4;

pub const SEQUENCES: [&str; 5] = [
    "PIGLRVTLRRDRMWIFLEKLLNVALPRIRDFRGLN--PNSFDGRGNYNLGLREQLIFPEITYDMVDALRGMDIAVVT------TAETDEE----------ARALLELLGFPFR",
    "PIGLKVTLRGARMYNFLYKLINIVLPKVRDFRGLD--PNSFDGRGNYSFGLSEQLVFPELNPDEVRRIQGMDITIVT------TAKTDQE----------ARRLLELFGMPFK",
    "AIGAKVTLRGKKMYDFLDKLINVALPRVRDFRGVS--KTSFDGFGNFYTGIKEQIIFPEVDHDKVIRLRGMDITIVT------SAKTNKE----------AFALLQKIGMPFE",
    "PIGVMVTLRGDYMYAFLDRLINLSLPRIRDFRGIT--AKSFDGRGNYNLGLKEQLIFPEVDYDGIEQIRGMDISIVT------TAKTDQE----------GLALLKSLGMPFA",
    "PIGTHATLRGDRMWEFLDRLVTLPLPRIRDFRGLS--DRQFDGNGNYTFGLSEQTVFHEIDQDKIDRVRGMDITVVT------TAKNDDE----------GRALLKALGFPFK",
];

/// Branch lengths of matrix slots 0..4
pub const BRANCH_LENGTHS: [f64; 4] = [0.1, 0.2, 1.0, 1.0];

pub const OPERATIONS: [Operation; 3] = [
    Operation {
        parent: 5,
        child1: 0,
        child1_matrix: 1,
        child2: 1,
        child2_matrix: 1,
    },
    Operation {
        parent: 6,
        child1: 5,
        child1_matrix: 0,
        child2: 2,
        child2_matrix: 1,
    },
    Operation {
        parent: 7,
        child1: 3,
        child1_matrix: 1,
        child2: 4,
        child2_matrix: 1,
    },
];

/// Buffers and slots of the evaluation edge: (left, right, left_matrix, right_matrix)
pub const EDGE: (usize, usize, usize, usize) = (6, 7, 0, 0);

/// A partition with tips, gamma rates and topology set, but no model yet.
pub fn partition(scaling: bool) -> Result<Partition> {
    let dims = Dimensions {
        tips: SEQUENCES.len(),
        clv_buffers: 4,
        states: 20,
        sites: SEQUENCES[0].len(),
        rate_matrices: 1,
        prob_matrices: 8,
        rate_cats: RATE_CATS,
    };
    let mut partition = Partition::new(dims, Attributes { scaling })?;
    partition.set_category_rates(&compute_gamma_categories(ALPHA, RATE_CATS)?)?;

    let map = StateMap::aa();
    for (tip, seq) in SEQUENCES.iter().enumerate() {
        partition.set_tip_states(tip, &map, seq)?;
    }

    Ok(partition)
}

/// Load `model`, update matrices and partials.
pub fn prepare(partition: &mut Partition, model: &EmpiricalModel) -> Result<()> {
    partition.set_subst_params(0, &model.exchangeabilities)?;
    partition.set_frequencies(0, &model.frequencies)?;
    partition.update_prob_matrices(0, &[0, 1, 2, 3], &BRANCH_LENGTHS)?;
    partition.update_partials(&OPERATIONS)?;
    Ok(())
}

/// Log-likelihood of the benchmark under `model`.
pub fn log_likelihood(partition: &mut Partition, model: &EmpiricalModel) -> Result<f64> {
    prepare(partition, model)?;
    let (left, right, left_matrix, right_matrix) = EDGE;
    partition.compute_edge_log_likelihood(left, right, left_matrix, right_matrix)
}
