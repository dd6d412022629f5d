use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use secular::taylor_series;

const BATCH: usize = 16;
const CANDIDATES: usize = 4;
const ORDERS: usize = 4;

fn random_problem(num_eig: usize) -> (ArrayD<f64>, ArrayD<f64>, ArrayD<f64>) {
    let mut rng = StdRng::seed_from_u64(0x5EC0_11D5 + num_eig as u64);
    let component = Normal::new(0.0, 1.0).unwrap();
    let mut update_data = Vec::with_capacity(BATCH * (num_eig + 1));
    let mut eig_data = Vec::with_capacity(BATCH * num_eig);
    let mut mu_data = Vec::with_capacity(BATCH * CANDIDATES);
    for _ in 0..BATCH {
        for _ in 0..num_eig + 1 {
            let draw: f64 = component.sample(&mut rng);
            update_data.push(draw.abs() + 0.05);
        }
        let mut pole = 0.0;
        for _ in 0..num_eig {
            pole += rng.gen_range(0.5..1.5);
            eig_data.push(pole);
        }
        for _ in 0..CANDIDATES {
            // Candidates strictly inside the first pole gap.
            mu_data.push(rng.gen_range(0.01..0.4));
        }
    }
    (
        ArrayD::from_shape_vec(IxDyn(&[BATCH, num_eig + 1]), update_data).unwrap(),
        ArrayD::from_shape_vec(IxDyn(&[BATCH, num_eig]), eig_data).unwrap(),
        ArrayD::from_shape_vec(IxDyn(&[BATCH, CANDIDATES]), mu_data).unwrap(),
    )
}

fn benchmark_taylor(c: &mut Criterion) {
    let sizes = [8_usize, 32, 128];
    let problems: Vec<_> = sizes.iter().map(|&n| (n, random_problem(n))).collect();

    let mut group = c.benchmark_group("secular_taylor_series");
    for (num_eig, (update_vec, eigenvalues, mu)) in problems.iter() {
        let terms = (BATCH * CANDIDATES * ORDERS * (num_eig + 1)) as u64;
        group.throughput(Throughput::Elements(terms));

        group.bench_with_input(
            BenchmarkId::from_parameter(num_eig),
            &(update_vec, eigenvalues, mu),
            |b, (update_vec, eigenvalues, mu)| {
                b.iter(|| {
                    let coefficients = taylor_series(
                        black_box(update_vec.view()),
                        black_box(eigenvalues.view()),
                        black_box(mu.view()),
                        0,
                        ORDERS,
                    )
                    .unwrap();
                    black_box(coefficients);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_taylor);
criterion_main!(benches);
