use super::*;
use crate::nn::module::check_input;
use crate::tensor::{column, full};
use crate::utils::testing::{assert_column, check_tensor_near};
use approx::assert_relative_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Identity module that counts how often each hook runs.
#[derive(Debug)]
struct Counting {
    dim: usize,
    forwards: Arc<AtomicUsize>,
    backwards: Arc<AtomicUsize>,
}

impl Module for Counting {
    fn name(&self) -> &'static str {
        "Counting"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim)?;
        self.forwards.fetch_add(1, Ordering::SeqCst);
        Ok(input.clone())
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        self.backwards.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.output_grad.clone())
    }
}

// Returns an input gradient of the wrong length.
#[derive(Debug)]
struct Truncating;

impl Module for Truncating {
    fn name(&self) -> &'static str {
        "Truncating"
    }

    fn dim_in(&self) -> usize {
        3
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        Ok(input.clone())
    }

    fn backward(&mut self, _ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        Ok(column(vec![0.0, 0.0]))
    }
}

fn counting_chain(
    stages: usize,
) -> Result<(Chain, Vec<Arc<AtomicUsize>>, Vec<Arc<AtomicUsize>>), ChainError> {
    let mut builder = ChainBuilder::new(2, 2)?.seed(1);
    let mut forwards = Vec::new();
    let mut backwards = Vec::new();
    for _ in 0..stages {
        let f = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        builder = builder.push(Box::new(Counting {
            dim: 2,
            forwards: Arc::clone(&f),
            backwards: Arc::clone(&b),
        }))?;
        forwards.push(f);
        backwards.push(b);
    }
    Ok((builder.euclidean()?, forwards, backwards))
}

fn counts(c: &[Arc<AtomicUsize>]) -> Vec<usize> {
    c.iter().map(|a| a.load(Ordering::SeqCst)).collect()
}

#[test]
fn test_each_module_runs_once_per_pass() -> Result<(), ChainError> {
    let (mut chain, forwards, backwards) = counting_chain(3)?;
    chain.set_sample(column(vec![1.0, 2.0]), column(vec![0.0, 0.0]))?;

    let value = chain.forward()?;
    assert_relative_eq!(value, 2.5, epsilon = 1e-12);
    assert_eq!(counts(&forwards), vec![1, 1, 1]);
    assert_eq!(counts(&backwards), vec![0, 0, 0]);

    chain.backward()?;
    assert_eq!(counts(&forwards), vec![1, 1, 1]);
    assert_eq!(counts(&backwards), vec![1, 1, 1]);

    // The identity chain passes the loss gradient straight through.
    let first = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    let dx = chain.input_gradient(first)?.ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(dx, (2, 1), &[1.0, 2.0], 1e-12);
    Ok(())
}

#[test]
fn test_propagate_forward_stops_at_requested_module() -> Result<(), ChainError> {
    let (mut chain, forwards, _) = counting_chain(3)?;
    chain.set_sample(column(vec![1.0, 2.0]), column(vec![0.0, 0.0]))?;
    let second = chain.layer(1).ok_or(ChainError::UnknownModule(2))?;
    chain.propagate_forward(second)?;
    assert_eq!(counts(&forwards), vec![1, 1, 0]);
    assert!(chain.activation(second)?.is_some());
    assert!(chain.loss_value().is_none());
    Ok(())
}

#[test]
fn test_chain_without_interior_modules() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(2, 2)?.euclidean()?;
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.loss_id().position(), 1);
    chain.set_sample(column(vec![1.0, 3.0]), column(vec![0.0, 1.0]))?;
    assert_relative_eq!(chain.forward()?, 2.5, epsilon = 1e-12);
    chain.backward()?;
    let dx = chain
        .input_gradient(chain.loss_id())?
        .ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(dx, (2, 1), &[1.0, 2.0], 1e-12);
    let dy = chain.target_gradient().ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(dy, (2, 1), &[-1.0, -2.0], 1e-12);
    Ok(())
}

#[test]
fn test_linear_euclidean_by_hand() -> Result<(), ChainError> {
    let weights = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], (2, 2))?;
    let mut chain = ChainBuilder::new(2, 2)?
        .push(Box::new(Linear::from_weights(weights)?))?
        .euclidean()?;
    let linear = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    chain.set_sample(column(vec![1.0, 1.0]), column(vec![0.0, 0.0]))?;

    assert_relative_eq!(chain.forward()?, 29.0, epsilon = 1e-12);
    let z = chain.activation(linear)?.ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(z, (2, 1), &[3.0, 7.0], 1e-12);
    let losses = chain.losses().ok_or(ChainError::UnknownModule(2))?;
    check_tensor_near(losses, (2, 1), &[9.0, 49.0], 1e-12);

    chain.backward()?;
    let dw = chain.gradient(linear)?.ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(dw, (2, 2), &[3.0, 3.0, 7.0, 7.0], 1e-12);
    let dx = chain.input_gradient(linear)?.ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(dx, (2, 1), &[24.0, 34.0], 1e-12);
    Ok(())
}

#[test]
fn test_backward_before_forward_is_rejected() -> Result<(), ChainError> {
    let (mut chain, _, backwards) = counting_chain(2)?;
    chain.set_sample(column(vec![1.0, 2.0]), column(vec![0.0, 0.0]))?;
    assert!(matches!(chain.backward(), Err(ChainError::InvalidState(_))));
    assert_eq!(counts(&backwards), vec![0, 0]);
    Ok(())
}

#[test]
fn test_forward_without_sample_is_rejected() -> Result<(), ChainError> {
    let (mut chain, forwards, _) = counting_chain(2)?;
    assert!(matches!(chain.forward(), Err(ChainError::InvalidState(_))));
    assert_eq!(counts(&forwards), vec![0, 0]);
    Ok(())
}

#[test]
fn test_new_sample_invalidates_scratch() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(3, 2)?.seed(5).linear(2)?.euclidean()?;
    let linear = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    chain.set_sample(column(vec![1.0, 2.0, 3.0]), column(vec![0.0, 1.0]))?;
    chain.forward()?;
    chain.backward()?;
    assert!(chain.gradient(linear)?.is_some());

    chain.set_sample(column(vec![3.0, 2.0, 1.0]), column(vec![1.0, 0.0]))?;
    assert_eq!(chain.sample_index(), 1);
    assert!(chain.activation(linear)?.is_none());
    assert!(chain.input_gradient(linear)?.is_none());
    assert!(chain.gradient(linear)?.is_none());
    assert!(chain.loss_value().is_none());
    assert!(chain.target_gradient().is_none());
    assert!(matches!(chain.backward(), Err(ChainError::InvalidState(_))));
    Ok(())
}

#[test]
fn test_set_parameters_roundtrip_and_invalidation() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(3, 2)?.seed(5).linear(2)?.euclidean()?;
    let linear = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    chain.set_sample(column(vec![1.0, 2.0, 3.0]), column(vec![0.0, 1.0]))?;
    chain.forward()?;

    chain.set_parameters(linear, full((2, 3), 0.5))?;
    assert!(chain.loss_value().is_none());
    let params = chain.parameters(linear)?.ok_or(ChainError::UnknownModule(1))?;
    check_tensor_near(params, (2, 3), &[0.5; 6], 0.0);

    // z = [3, 3], y = [0, 1]
    assert_relative_eq!(chain.forward()?, 6.5, epsilon = 1e-12);

    let wrong = chain.set_parameters(linear, full((3, 2), 0.5));
    assert!(matches!(wrong, Err(ChainError::ShapeMismatch { .. })));
    let input = chain.input_id();
    assert!(matches!(
        chain.set_parameters(input, full((1, 1), 0.5)),
        Err(ChainError::NoParameters { .. })
    ));
    let loss = chain.loss_id();
    assert!(matches!(
        chain.set_parameters(loss, full((1, 1), 0.5)),
        Err(ChainError::NoParameters { .. })
    ));
    assert!(chain.parameters(input)?.is_none());
    assert!(chain.parameters(loss)?.is_none());
    Ok(())
}

#[test]
fn test_unknown_module_id() -> Result<(), ChainError> {
    let chain = ChainBuilder::new(2, 2)?.euclidean()?;
    let bogus = ModuleId(7);
    assert!(matches!(chain.describe(bogus), Err(ChainError::UnknownModule(7))));
    assert!(matches!(chain.parameters(bogus), Err(ChainError::UnknownModule(7))));
    Ok(())
}

#[test]
fn test_connect_dimension_mismatch() -> Result<(), ChainError> {
    let result = ChainBuilder::new(3, 3)?.push(Box::new(Truncating))?.push(Box::new(
        Counting {
            dim: 2,
            forwards: Arc::new(AtomicUsize::new(0)),
            backwards: Arc::new(AtomicUsize::new(0)),
        },
    ));
    match result {
        Err(ChainError::DimensionMismatch {
            predecessor,
            successor,
            expected,
            actual,
        }) => {
            assert_eq!(predecessor, "Truncating");
            assert_eq!(successor, "Counting");
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("expected DimensionMismatch, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_loss_must_match_target_dimension() -> Result<(), ChainError> {
    let result = ChainBuilder::new(4, 2)?.seed(3).linear(3)?.euclidean();
    assert!(matches!(
        result,
        Err(ChainError::TargetDimensionMismatch {
            expected: 3,
            actual: 2,
            ..
        })
    ));
    let result = ChainBuilder::new(4, 2)?
        .seed(3)
        .linear(3)?
        .finish(Box::new(EuclideanLoss::new(2)?));
    assert!(matches!(result, Err(ChainError::DimensionMismatch { .. })));
    Ok(())
}

#[test]
fn test_rbf_templates_must_match_predecessor() -> Result<(), ChainError> {
    let result = ChainBuilder::new(4, 3)?.rbf(full((5, 3), 1.0));
    assert!(matches!(result, Err(ChainError::InvalidTemplates { .. })));
    let chain = ChainBuilder::new(4, 3)?.rbf(full((4, 3), 1.0))?.euclidean()?;
    assert_eq!(chain.describe(ModuleId(1))?, "RBF[3]");
    Ok(())
}

#[test]
fn test_backward_shape_contract_is_enforced() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(3, 3)?.push(Box::new(Truncating))?.euclidean()?;
    chain.set_sample(column(vec![1.0, 2.0, 3.0]), column(vec![0.0, 0.0, 0.0]))?;
    chain.forward()?;
    match chain.backward() {
        Err(ChainError::ShapeContract {
            module,
            what,
            expected,
            actual,
        }) => {
            assert_eq!(module, "Truncating");
            assert_eq!(what, "input_grad");
            assert_eq!(expected, (3, 1));
            assert_eq!(actual, (2, 1));
        }
        other => panic!("expected ShapeContract, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_domain_error_reports_sample_index() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(2, 2)?.cross_entropy()?;
    chain.set_sample(column(vec![0.5, 0.5]), column(vec![1.0, 0.0]))?;
    chain.forward()?;
    chain.set_sample(column(vec![0.5, 0.5]), column(vec![0.0, 1.0]))?;
    chain.forward()?;
    chain.set_sample(column(vec![0.0, 1.0]), column(vec![1.0, 0.0]))?;
    match chain.forward() {
        Err(ChainError::Domain { module, sample, .. }) => {
            assert_eq!(module, "CrossEntropy");
            assert_eq!(sample, 2);
        }
        other => panic!("expected Domain, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_describe_and_dimensions() -> Result<(), ChainError> {
    let chain = ChainBuilder::new(20, 5)?
        .seed(11)
        .linear(5)?
        .bias()?
        .sigmoid()?
        .softmax()?
        .neg_exp()?
        .euclidean()?;
    let names: Vec<String> = chain
        .module_ids()
        .map(|id| chain.describe(id))
        .collect::<Result<_, _>>()?;
    assert_eq!(
        names,
        vec![
            "Input[20]",
            "Linear[5]",
            "Bias[5]",
            "Sigmoid[5]",
            "SoftMax[5]",
            "NegExp[5]",
            "Euclidean[1]"
        ]
    );
    assert_eq!(chain.dim_out(chain.input_id())?, 20);
    assert_eq!(chain.len(), 7);
    assert!(chain.layer(5).is_none());
    Ok(())
}

#[test]
fn test_seeded_builders_agree_and_randomize_is_deterministic() -> Result<(), ChainError> {
    let build = || ChainBuilder::new(4, 3).and_then(|b| b.seed(99).linear(3)?.bias()?.euclidean());
    let mut a = build()?;
    let b = build()?;
    let linear = a.layer(0).ok_or(ChainError::UnknownModule(1))?;
    assert_eq!(a.parameters(linear)?, b.parameters(linear)?);

    let before = a.parameters(linear)?.cloned();
    a.randomize(1.0, 123)?;
    assert_ne!(a.parameters(linear)?.cloned(), before);
    let mut c = build()?;
    c.randomize(1.0, 123)?;
    assert_eq!(a.parameters(linear)?, c.parameters(linear)?);

    let bound = 1.0 / 2.0;
    let params = a.parameters(linear)?.ok_or(ChainError::UnknownModule(1))?;
    assert!(params.data().iter().all(|w| w.abs() <= bound));
    Ok(())
}

#[test]
fn test_activations_are_columns() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(3, 2)?.seed(8).linear(4)?.sigmoid()?.linear(2)?.euclidean()?;
    // Row-vector samples are stored as columns.
    chain.set_sample(
        Tensor::new(vec![0.1, 0.2, 0.3], (1, 3))?,
        Tensor::new(vec![1.0, 0.0], (1, 2))?,
    )?;
    chain.forward()?;
    chain.backward()?;
    for id in chain.module_ids().skip(1).take(3) {
        let dim = chain.dim_out(id)?;
        assert_column(chain.activation(id)?.ok_or(ChainError::UnknownModule(id.position()))?, dim);
    }
    Ok(())
}

#[test]
fn test_bad_init_scale_is_a_configuration_error() -> Result<(), ChainError> {
    for scale in [-1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            ChainBuilder::new(3, 2)?.init_scale(scale),
            Err(ChainError::InvalidScale { .. })
        ));
    }
    let chain = ChainBuilder::new(3, 2)?
        .seed(2)
        .init_scale(0.5)?
        .linear(2)?
        .euclidean()?;
    let linear = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    let bound = 0.5 / 3f64.sqrt();
    let params = chain.parameters(linear)?.ok_or(ChainError::UnknownModule(1))?;
    assert!(params.data().iter().all(|w| w.abs() <= bound));
    Ok(())
}

#[test]
fn test_randomize_rejects_bad_scale_without_touching_parameters() -> Result<(), ChainError> {
    let mut chain = ChainBuilder::new(3, 2)?.seed(2).linear(2)?.euclidean()?;
    let linear = chain.layer(0).ok_or(ChainError::UnknownModule(1))?;
    let before = chain.parameters(linear)?.cloned();
    assert!(matches!(
        chain.randomize(-1.0, 9),
        Err(ChainError::InvalidScale { .. })
    ));
    assert_eq!(chain.parameters(linear)?.cloned(), before);
    Ok(())
}

#[test]
fn test_chain_is_never_empty() -> Result<(), ChainError> {
    let chain = ChainBuilder::new(1, 1)?.euclidean()?;
    assert!(!chain.is_empty());
    assert_eq!(chain.len(), 2);
    Ok(())
}
