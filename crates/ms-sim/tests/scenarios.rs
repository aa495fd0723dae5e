//! Stepping scenarios: clock determinism, Euler integration, discrete states.

use ms_sim::{SimConfig, SimError, SimOptions, Simulator, model_fn};
use proptest::prelude::*;

fn constant_rate(x0: &[f64], cont_states: usize, rate: Vec<f64>) -> Simulator {
    Simulator::new(
        SimConfig::new(SimOptions::new(x0).with_cont_states(cont_states)),
        model_fn(move |_, _, _, _, _| Ok(rate.clone())),
    )
    .expect("valid configuration")
}

#[test]
fn unit_rate_for_five_steps() {
    let sim = constant_rate(&[0.0], 1, vec![1.0]);
    for _ in 0..5 {
        sim.next().unwrap();
    }
    assert!((sim.x()[0] - 0.5).abs() < 1e-12, "x = {:?}", sim.x());
    assert!((sim.t() - 0.5).abs() < 1e-12, "t = {}", sim.t());
    assert_eq!(sim.t(), 5.0 * sim.delta_t());
}

#[test]
fn mixed_continuous_and_discrete_step() {
    let sim = constant_rate(&[0.0, 10.0], 1, vec![2.0, 99.0]);
    sim.next().unwrap();
    let x = sim.x();
    assert_eq!(x[0], 0.0 + sim.delta_t() * 2.0);
    assert_eq!(x[1], 99.0);
    assert_eq!(sim.prev_x(), Some(vec![0.0, 10.0]));
}

#[test]
fn cont_states_defaults_to_all_continuous() {
    let sim = Simulator::new(
        SimConfig::new(SimOptions::new([0.0, 0.0])),
        model_fn(|_, _, _, _, _| Ok(vec![1.0, 1.0])),
    )
    .unwrap();
    sim.next().unwrap();
    assert_eq!(sim.cont_states(), 2);
    assert_eq!(sim.x(), vec![sim.delta_t(), sim.delta_t()]);
}

#[test]
fn all_discrete_states_follow_model_exactly() {
    let sim = Simulator::new(
        SimConfig::new(SimOptions::new([1.0, 2.0]).with_cont_states(0)),
        model_fn(|t, _, _, x: &[f64], _| Ok(vec![x[1], t])),
    )
    .unwrap();
    sim.next().unwrap();
    assert_eq!(sim.x(), vec![2.0, 0.0]);
    sim.next().unwrap();
    assert_eq!(sim.x(), vec![0.0, sim.delta_t()]);
}

#[test]
fn speed_factor_scales_simulated_step() {
    let sim = Simulator::new(
        SimConfig::new(
            SimOptions::new([0.0])
                .with_delta_t_ms(50.0)
                .with_speed_factor(4.0),
        ),
        model_fn(|_, dt, _, _, _| {
            assert!((dt - 0.2).abs() < 1e-12);
            Ok(vec![1.0])
        }),
    )
    .unwrap();
    sim.next().unwrap();
    assert!((sim.t() - 0.2).abs() < 1e-12);
    assert_eq!(sim.delta_t_ms(), 50.0);
}

#[test]
fn model_receives_time_before_advance() {
    let sim = Simulator::new(
        SimConfig::new(SimOptions::new([0.0]).with_cont_states(0)),
        model_fn(|t, _, _, _, _| Ok(vec![t])),
    )
    .unwrap();
    sim.next().unwrap();
    sim.next().unwrap();
    assert_eq!(sim.x(), vec![sim.delta_t()]);
}

#[test]
fn wrong_length_model_output_fails_fast() {
    let sim = constant_rate(&[0.0, 0.0], 2, vec![1.0, 1.0, 1.0]);
    let err = sim.next().unwrap_err();
    assert!(matches!(
        err,
        SimError::LengthMismatch {
            expected: 2,
            actual: 3,
            ..
        }
    ));
    assert_eq!(sim.t(), 0.0);
    assert_eq!(sim.steps(), 0);
    assert_eq!(sim.x(), vec![0.0, 0.0]);
}

#[test]
fn failed_step_keeps_last_good_state() {
    let sim = Simulator::new(
        SimConfig::new(SimOptions::new([0.0])),
        model_fn(|t, _, _, _, _| {
            if t > 0.25 {
                Err(SimError::model("model diverged"))
            } else {
                Ok(vec![1.0])
            }
        }),
    )
    .unwrap();
    for _ in 0..3 {
        sim.next().unwrap();
    }
    let good = sim.snapshot();

    assert_eq!(sim.next(), Err(SimError::model("model diverged")));
    assert_eq!(sim.snapshot(), good);
}

#[test]
fn empty_state_vector_is_a_no_op_step() {
    let sim = Simulator::new(
        SimConfig::default(),
        model_fn(|_, _, _, _, _| Ok(Vec::new())),
    )
    .unwrap();
    assert!(sim.is_empty());
    sim.next().unwrap();
    assert!(sim.x().is_empty());
    assert_eq!(sim.steps(), 1);
}

#[test]
fn options_load_from_yaml_with_defaults() {
    let opts: SimOptions = serde_yaml::from_str("x0: [0.0, 1.0]\ncont_states: 1\n").unwrap();
    assert_eq!(opts.delta_t_ms, 100.0);
    assert_eq!(opts.speed_factor, 1.0);
    assert_eq!(opts.cont_states, Some(1));
    let sim = Simulator::new(SimConfig::new(opts), model_fn(|_, _, _, _, _| Ok(vec![0.0, 3.0])))
        .unwrap();
    sim.next().unwrap();
    assert_eq!(sim.x(), vec![0.0, 3.0]);
}

#[test]
fn snapshot_serializes_to_json() {
    let sim = constant_rate(&[1.0], 1, vec![0.0]);
    sim.next().unwrap();
    let json = serde_json::to_value(sim.snapshot()).unwrap();
    assert_eq!(json["steps"], 1);
    assert_eq!(json["x"][0], 1.0);
}

proptest! {
    #[test]
    fn time_is_step_count_deterministic(
        delta_t_ms in 1.0_f64..500.0,
        speed_factor in 0.1_f64..10.0,
        n in 0_usize..200,
    ) {
        let sim = Simulator::new(
            SimConfig::new(
                SimOptions::new([0.0])
                    .with_delta_t_ms(delta_t_ms)
                    .with_speed_factor(speed_factor),
            ),
            model_fn(|_, _, _, _, _| Ok(vec![0.0])),
        )
        .unwrap();
        for _ in 0..n {
            sim.next().unwrap();
        }
        prop_assert_eq!(sim.t(), n as f64 * sim.delta_t());
        prop_assert_eq!(sim.steps(), n as u64);
    }

    #[test]
    fn constant_derivative_integrates_linearly(
        x0 in -100.0_f64..100.0,
        d in -50.0_f64..50.0,
        n in 1_usize..100,
    ) {
        let sim = constant_rate(&[x0], 1, vec![d]);
        for _ in 0..n {
            sim.next().unwrap();
        }
        let expected = x0 + n as f64 * sim.delta_t() * d;
        let actual = sim.x()[0];
        let tol = 1e-9 * (1.0 + expected.abs());
        prop_assert!((actual - expected).abs() <= tol, "{} vs {}", actual, expected);
    }

    #[test]
    fn discrete_entries_equal_returned_values(
        values in prop::collection::vec(-1e6_f64..1e6, 1..6),
    ) {
        let len = values.len();
        let returned = values.clone();
        let sim = Simulator::new(
            SimConfig::new(SimOptions::new(vec![0.5; len + 1]).with_cont_states(1)),
            model_fn(move |_, _, _, _, _| {
                let mut out = vec![1.0];
                out.extend_from_slice(&returned);
                Ok(out)
            }),
        )
        .unwrap();
        sim.next().unwrap();
        let x = sim.x();
        prop_assert_eq!(&x[1..], values.as_slice());
    }
}
