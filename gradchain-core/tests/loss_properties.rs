mod common;

use common::{init_logging, one_hot, seeded, uniform_column};
use gradchain_core::nn::SoftMax;
use gradchain_core::tensor::column;
use gradchain_core::{ChainBuilder, ChainError};
use rand::Rng;

#[test]
fn softmax_output_is_a_distribution_for_any_finite_input() -> Result<(), ChainError> {
    init_logging();
    let mut rng = seeded(21);
    for round in 0..50 {
        let temperature = rng.gen_range(-50.0..50.0);
        let mut chain = ChainBuilder::new(7, 7)?
            .push(Box::new(SoftMax::with_temperature(7, temperature)?))?
            .euclidean()?;
        let magnitude = if round % 2 == 0 { 1.0 } else { 1e3 };
        let x = uniform_column(7, -magnitude, magnitude, &mut rng);
        chain.set_sample(x, uniform_column(7, 0.0, 1.0, &mut rng))?;
        chain.forward()?;
        let id = chain.layer(0).expect("softmax position");
        let p = chain.activation(id)?.expect("softmax output");
        assert!(p.data().iter().all(|&v| v >= 0.0 && v.is_finite()));
        assert!((p.sum() - 1.0).abs() < 1e-12, "sum {} at round {}", p.sum(), round);
    }
    Ok(())
}

#[test]
fn cross_entropy_reports_zero_probability_instead_of_nan() -> Result<(), ChainError> {
    init_logging();
    let mut chain = ChainBuilder::new(4, 4)?.cross_entropy()?;
    chain.set_sample(column(vec![0.5, 0.0, 0.25, 0.25]), one_hot(4, 1))?;
    match chain.forward() {
        Err(ChainError::Domain { module, sample, .. }) => {
            assert_eq!(module, "CrossEntropy");
            assert_eq!(sample, 0);
        }
        other => panic!("expected a domain error, got {:?}", other),
    }
    assert!(chain.loss_value().is_none());
    Ok(())
}

#[test]
fn cross_entropy_value_is_bits_of_the_active_class() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(4, 4)?.cross_entropy()?;
    chain.set_sample(column(vec![0.125, 0.5, 0.25, 0.125]), one_hot(4, 2))?;
    assert_eq!(chain.forward()?, 2.0);
    let losses = chain.losses().expect("losses");
    assert_eq!(losses.data(), &[0.0, 0.0, 2.0, 0.0]);
    Ok(())
}

#[test]
fn euclidean_loss_is_non_negative_and_zero_only_on_exact_match() -> Result<(), ChainError> {
    let mut rng = seeded(22);
    let mut chain = ChainBuilder::new(5, 5)?.euclidean()?;
    for _ in 0..50 {
        let x = uniform_column(5, -3.0, 3.0, &mut rng);
        let y = uniform_column(5, -3.0, 3.0, &mut rng);
        chain.set_sample(x.clone(), y)?;
        assert!(chain.forward()? > 0.0);
        chain.set_sample(x.clone(), x)?;
        assert_eq!(chain.forward()?, 0.0);
    }
    Ok(())
}
