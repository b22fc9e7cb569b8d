use criterion::{black_box, criterion_group, criterion_main, Criterion};
use plk::libs::calibration;
use plk::libs::maps::StateMap;
use plk::libs::models::ProteinModel;
use plk::libs::partition::{Attributes, Dimensions, Operation, Partition};

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");

    let mut partition = calibration::partition(true).unwrap();
    calibration::prepare(&mut partition, &ProteinModel::Wag.into()).unwrap();

    group.bench_function("update_partials", |b| {
        b.iter(|| {
            partition
                .update_partials(black_box(&calibration::OPERATIONS))
                .unwrap()
        })
    });

    let (left, right, left_matrix, right_matrix) = calibration::EDGE;
    group.bench_function("edge_log_likelihood", |b| {
        b.iter(|| {
            partition
                .compute_edge_log_likelihood(left, right, left_matrix, right_matrix)
                .unwrap()
        })
    });

    group.bench_function("update_prob_matrices", |b| {
        b.iter(|| {
            partition
                .update_prob_matrices(0, &[0, 1, 2, 3], black_box(&calibration::BRANCH_LENGTHS))
                .unwrap()
        })
    });

    group.finish();
}

// 64 tips on a caterpillar, 2000 nucleotide sites
fn bench_caterpillar(c: &mut Criterion) {
    let tips = 64;
    let sites = 2000;
    let dims = Dimensions {
        tips,
        clv_buffers: tips - 1,
        states: 4,
        sites,
        rate_matrices: 1,
        prob_matrices: 1,
        rate_cats: 4,
    };
    let mut partition = Partition::new(dims, Attributes::default()).unwrap();
    partition
        .set_category_rates(&[0.1369538, 0.4767519, 1.0, 2.3862944])
        .unwrap();

    let map = StateMap::nt();
    let mut state: u64 = 42;
    for tip in 0..tips {
        let seq: Vec<u8> = (0..sites)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                b"ACGT"[(state >> 33) as usize % 4]
            })
            .collect();
        partition.set_tip_states(tip, &map, &seq).unwrap();
    }
    partition.update_prob_matrices(0, &[0], &[0.1]).unwrap();

    let mut ops = vec![Operation::new(tips, 0, 0, 1, 0)];
    for tip in 2..tips {
        let parent = tips + tip - 1;
        ops.push(Operation::new(parent, parent - 1, 0, tip, 0));
    }

    let mut group = c.benchmark_group("caterpillar");
    group.sample_size(20);
    group.bench_function("64_tips_2k_sites", |b| {
        b.iter(|| partition.update_partials(black_box(&ops)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_calibration, bench_caterpillar);
criterion_main!(benches);
