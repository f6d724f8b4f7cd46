//! # Real-Time Iteration Step Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use mpc_lib::{
    ocp::Params as OcpParams,
    reference::ReferenceTrajectory,
    rti::{Params as RtiParams, RtiSolver},
    vehicle::{Params as VehicleParams, State, VehicleModel}
};

fn rti_step_benchmark(c: &mut Criterion) {
    // ---- Build a gently curving reference ----

    let waypoints: Vec<State> = (0..50)
        .map(|i| {
            let s = i as f64 / 49.0;
            let x = 20.0 + 150.0 * s;
            let y = 100.0 + 30.0 * (3.0 * s).sin();
            let heading = (90.0 * (3.0 * s).cos() / 150.0).atan();
            State::new(x, y, heading)
        })
        .collect();

    let reference = Arc::new(ReferenceTrajectory::from_waypoints_over(waypoints, 70.0).unwrap());

    let model = VehicleModel::new(VehicleParams::default()).unwrap();
    let mut solver = RtiSolver::new(
        model, OcpParams::default(), RtiParams::default(), reference.clone()
    ).unwrap();

    // ---- Warm the solver up at an offset from the reference ----

    let t = 10.0 * reference.sampling_interval_s();
    let state = reference.value_at(t) + State::new(0.5, -0.5, 0.05);
    solver.compute_feedback(&state, t).unwrap();

    c.bench_function("rti_step_warm", |b| {
        b.iter(|| solver.compute_feedback(black_box(&state), black_box(t)).unwrap())
    });

    c.bench_function("rti_step_cold", |b| {
        b.iter(|| {
            solver.reset();
            solver.compute_feedback(black_box(&state), black_box(t)).unwrap()
        })
    });
}

criterion_group!(benches, rti_step_benchmark);
criterion_main!(benches);
