use crate::error::ChainError;
use crate::nn::init::check_scale;
use crate::nn::layers::{Bias, Linear, NegExp, Rbf, Sigmoid, SoftMax};
use crate::nn::losses::{CrossEntropyLoss, EuclideanLoss, Loss, LossGradients, LossOutput};
use crate::nn::module::{BackwardContext, Module};
use crate::nn::InputModule;
use crate::tensor::Tensor;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;

/// Handle to one position of a [`Chain`].
///
/// Position 0 is the input, the loss is last, and interior modules sit in
/// between in the order they were connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl ModuleId {
    pub fn position(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An interior position: the module plus its scratch values.
#[derive(Debug)]
struct Stage {
    module: Box<dyn Module>,
    activation: Option<Tensor>,
    input_grad: Option<Tensor>,
}

/// The terminal position.
#[derive(Debug)]
struct Terminal {
    loss: Box<dyn Loss>,
    output: Option<LossOutput>,
    grads: Option<LossGradients>,
}

/// A linear chain `Input → modules… → Loss`.
///
/// The chain is an arena: positions are indices, the predecessor of
/// position `p` is `p - 1` and its successor `p + 1`. Scratch values
/// (activations, input gradients, loss outputs) only ever describe the
/// current sample; installing a new sample or new parameters clears them.
#[derive(Debug)]
pub struct Chain {
    input: InputModule,
    stages: Vec<Stage>,
    terminal: Terminal,
    samples: usize,
}

fn stale(what: &str, position: usize) -> ChainError {
    ChainError::InvalidState(format!(
        "{} at position {} is not available for the current sample",
        what, position
    ))
}

/// Shape contract every `backward()` hook must honour.
fn check_contract(module: &dyn Module, dx: &Tensor) -> Result<(), ChainError> {
    let expected = (module.dim_in(), 1);
    if dx.shape() != expected {
        return Err(ChainError::ShapeContract {
            module: module.name().to_string(),
            what: "input_grad",
            expected,
            actual: dx.shape(),
        });
    }
    match (module.parameters(), module.param_grad()) {
        (Some(p), Some(g)) if p.shape() != g.shape() => Err(ChainError::ShapeContract {
            module: module.name().to_string(),
            what: "param_grad",
            expected: p.shape(),
            actual: g.shape(),
        }),
        (Some(p), None) => Err(ChainError::ShapeContract {
            module: module.name().to_string(),
            what: "param_grad",
            expected: p.shape(),
            actual: (0, 0),
        }),
        (None, Some(g)) => Err(ChainError::ShapeContract {
            module: module.name().to_string(),
            what: "param_grad",
            expected: (0, 0),
            actual: g.shape(),
        }),
        _ => Ok(()),
    }
}

impl Chain {
    /// Number of positions, input and loss included.
    pub fn len(&self) -> usize {
        self.stages.len() + 2
    }

    /// Always `false`: a chain holds at least its input and its loss.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn input_id(&self) -> ModuleId {
        ModuleId(0)
    }

    pub fn loss_id(&self) -> ModuleId {
        ModuleId(self.stages.len() + 1)
    }

    /// The `index`-th interior module (0-based), if any.
    pub fn layer(&self, index: usize) -> Option<ModuleId> {
        (index < self.stages.len()).then(|| ModuleId(index + 1))
    }

    /// The position after `id`, `None` for the loss.
    pub fn successor(&self, id: ModuleId) -> Option<ModuleId> {
        (id.0 + 1 < self.len()).then(|| ModuleId(id.0 + 1))
    }

    /// The position before `id`, `None` for the input.
    pub fn predecessor(&self, id: ModuleId) -> Option<ModuleId> {
        id.0.checked_sub(1)
            .filter(|&p| p < self.len())
            .map(ModuleId)
    }

    /// All positions from input to loss.
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.len()).map(ModuleId)
    }

    /// Index of the sample currently installed (0-based).
    pub fn sample_index(&self) -> usize {
        self.samples.saturating_sub(1)
    }

    pub fn input(&self) -> &InputModule {
        &self.input
    }

    fn check_id(&self, id: ModuleId) -> Result<usize, ChainError> {
        if id.0 < self.len() {
            Ok(id.0)
        } else {
            Err(ChainError::UnknownModule(id.0))
        }
    }

    fn terminal_position(&self) -> usize {
        self.stages.len() + 1
    }

    /// Installs the next sample and invalidates every scratch value.
    pub fn set_sample(&mut self, x: Tensor, y: Tensor) -> Result<(), ChainError> {
        self.input.set_sample(x, y)?;
        self.samples += 1;
        self.invalidate();
        trace!("Chain: installed sample {}", self.sample_index());
        Ok(())
    }

    fn invalidate(&mut self) {
        for stage in &mut self.stages {
            stage.activation = None;
            stage.input_grad = None;
            stage.module.clear_grad();
        }
        self.terminal.output = None;
        self.terminal.grads = None;
    }

    /// Runs a forward pass over the whole chain and returns the loss.
    pub fn forward(&mut self) -> Result<f64, ChainError> {
        debug!("Chain: forward requested for sample {}", self.sample_index());
        self.propagate_forward(self.loss_id())?;
        self.terminal
            .output
            .as_ref()
            .map(|o| o.value)
            .ok_or_else(|| stale("loss value", self.terminal_position()))
    }

    /// Runs a backward pass, populating every input and parameter gradient.
    /// Requires a forward pass on the current sample.
    pub fn backward(&mut self) -> Result<(), ChainError> {
        debug!("Chain: backward requested for sample {}", self.sample_index());
        self.propagate_backward(self.input_id())
    }

    /// Makes `id` produce its output: every predecessor first, then `id` itself.
    pub fn propagate_forward(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let position = self.check_id(id)?;
        let sample = self.sample_index();
        self.forward_at(position).map_err(|e| {
            warn!("Chain: forward pass aborted at sample {}: {}", sample, e);
            e.at_sample(sample)
        })
    }

    /// Makes `id` produce its gradient: every successor first, then `id` itself.
    pub fn propagate_backward(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let position = self.check_id(id)?;
        let sample = self.sample_index();
        self.backward_at(position).map_err(|e| {
            warn!("Chain: backward pass aborted at sample {}: {}", sample, e);
            e.at_sample(sample)
        })
    }

    fn forward_at(&mut self, position: usize) -> Result<(), ChainError> {
        let n = self.stages.len();
        if position == 0 {
            // The sample is already resident.
            return self.input.x().map(|_| ());
        }
        self.forward_at(position - 1)?;
        if position <= n {
            self.forward_stage(position - 1)
        } else {
            self.forward_terminal()
        }
    }

    fn forward_stage(&mut self, index: usize) -> Result<(), ChainError> {
        let (before, rest) = self.stages.split_at_mut(index);
        let input = match before.last() {
            Some(prev) => prev.activation.as_ref().ok_or_else(|| stale("activation", index))?,
            None => self.input.x()?,
        };
        let stage = &mut rest[0];
        trace!("Chain: forward {} at position {}", stage.module.name(), index + 1);
        let out = stage.module.forward(input)?;
        let expected = (stage.module.dim_out(), 1);
        if out.shape() != expected {
            return Err(ChainError::ShapeContract {
                module: stage.module.name().to_string(),
                what: "activation",
                expected,
                actual: out.shape(),
            });
        }
        stage.activation = Some(out);
        stage.input_grad = None;
        stage.module.clear_grad();
        Ok(())
    }

    fn forward_terminal(&mut self) -> Result<(), ChainError> {
        let prediction = match self.stages.last() {
            Some(prev) => prev
                .activation
                .as_ref()
                .ok_or_else(|| stale("activation", self.stages.len()))?,
            None => self.input.x()?,
        };
        let target = self.input.y()?;
        trace!("Chain: forward {} (loss)", self.terminal.loss.name());
        let out = self.terminal.loss.forward(prediction, target)?;
        self.terminal.output = Some(out);
        self.terminal.grads = None;
        Ok(())
    }

    fn backward_at(&mut self, position: usize) -> Result<(), ChainError> {
        let n = self.stages.len();
        if position == 0 {
            // Nothing to differentiate at the root.
            return self.backward_at(1);
        }
        if position > n {
            return self.backward_terminal();
        }
        self.backward_at(position + 1)?;
        self.backward_stage(position - 1)
    }

    fn backward_terminal(&mut self) -> Result<(), ChainError> {
        let position = self.terminal_position();
        if self.terminal.output.is_none() {
            return Err(ChainError::InvalidState(
                "backward requested before a forward pass on the current sample".to_string(),
            ));
        }
        let prediction = match self.stages.last() {
            Some(prev) => prev
                .activation
                .as_ref()
                .ok_or_else(|| stale("activation", position - 1))?,
            None => self.input.x()?,
        };
        let target = self.input.y()?;
        let loss = &self.terminal.loss;
        trace!("Chain: backward {} (loss)", loss.name());
        let grads = loss.backward(prediction, target)?;
        let expected = (loss.dim_in(), 1);
        for (what, t) in [("input_grad", &grads.input_grad), ("target_grad", &grads.target_grad)] {
            if t.shape() != expected {
                return Err(ChainError::ShapeContract {
                    module: loss.name().to_string(),
                    what,
                    expected,
                    actual: t.shape(),
                });
            }
        }
        self.terminal.grads = Some(grads);
        Ok(())
    }

    fn backward_stage(&mut self, index: usize) -> Result<(), ChainError> {
        let (before, rest) = self.stages.split_at_mut(index);
        let Some((stage, after)) = rest.split_first_mut() else {
            return Err(ChainError::UnknownModule(index + 1));
        };
        let output_grad = match after.first() {
            Some(next) => next.input_grad.as_ref(),
            None => self.terminal.grads.as_ref().map(|g| &g.input_grad),
        }
        .ok_or_else(|| stale("successor gradient", index + 2))?;
        let input = match before.last() {
            Some(prev) => prev.activation.as_ref().ok_or_else(|| stale("activation", index))?,
            None => self.input.x()?,
        };
        let output = stage
            .activation
            .as_ref()
            .ok_or_else(|| stale("activation", index + 1))?;

        trace!("Chain: backward {} at position {}", stage.module.name(), index + 1);
        let ctx = BackwardContext {
            input,
            output,
            output_grad,
        };
        let dx = stage.module.backward(&ctx)?;
        check_contract(stage.module.as_ref(), &dx)?;
        stage.input_grad = Some(dx);
        Ok(())
    }

    /// The loss of the last forward pass on the current sample.
    pub fn loss_value(&self) -> Option<f64> {
        self.terminal.output.as_ref().map(|o| o.value)
    }

    /// Per-element loss contributions of the last forward pass.
    pub fn losses(&self) -> Option<&Tensor> {
        self.terminal.output.as_ref().map(|o| &o.losses)
    }

    /// Gradient of the loss with respect to the target (`dy`).
    pub fn target_gradient(&self) -> Option<&Tensor> {
        self.terminal.grads.as_ref().map(|g| &g.target_grad)
    }

    /// The most recent output of `id`: the sample `x` for the input, the
    /// activation for an interior module, `None` for the loss (see
    /// [`Chain::loss_value`]).
    pub fn activation(&self, id: ModuleId) -> Result<Option<&Tensor>, ChainError> {
        let position = self.check_id(id)?;
        Ok(match position {
            0 => self.input.x().ok(),
            p if p <= self.stages.len() => self.stages[p - 1].activation.as_ref(),
            _ => None,
        })
    }

    /// Gradient of the objective with respect to the input of `id`, as a
    /// `(dim_in, 1)` column. `None` for the input position and before a
    /// backward pass.
    pub fn input_gradient(&self, id: ModuleId) -> Result<Option<&Tensor>, ChainError> {
        let position = self.check_id(id)?;
        Ok(match position {
            0 => None,
            p if p <= self.stages.len() => self.stages[p - 1].input_grad.as_ref(),
            _ => self.terminal.grads.as_ref().map(|g| &g.input_grad),
        })
    }

    pub fn parameters(&self, id: ModuleId) -> Result<Option<&Tensor>, ChainError> {
        let position = self.check_id(id)?;
        Ok(self.stage(position).and_then(|s| s.module.parameters()))
    }

    /// Parameter gradient of `id`, same shape as its parameters.
    pub fn gradient(&self, id: ModuleId) -> Result<Option<&Tensor>, ChainError> {
        let position = self.check_id(id)?;
        Ok(self.stage(position).and_then(|s| s.module.param_grad()))
    }

    /// Replaces the parameters of `id`. Every scratch value is invalidated.
    pub fn set_parameters(&mut self, id: ModuleId, values: Tensor) -> Result<(), ChainError> {
        let position = self.check_id(id)?;
        let name = self.describe(id)?;
        match position {
            p if p >= 1 && p <= self.stages.len() => {
                self.stages[p - 1].module.set_parameters(values)?;
            }
            _ => return Err(ChainError::NoParameters { module: name }),
        }
        self.invalidate();
        Ok(())
    }

    /// Re-draws every randomizable parameter with fan-in bound `scale / sqrt(dim_in)`.
    ///
    /// # Errors
    /// Returns `ChainError::InvalidScale` for a negative or non-finite `scale`;
    /// no parameter is touched in that case.
    pub fn randomize(&mut self, scale: f64, seed: u64) -> Result<(), ChainError> {
        check_scale(scale)?;
        let mut rng = StdRng::seed_from_u64(seed);
        for stage in &mut self.stages {
            stage.module.randomize(scale, &mut rng)?;
        }
        self.invalidate();
        debug!("Chain: randomized parameters (scale {}, seed {})", scale, seed);
        Ok(())
    }

    fn stage(&self, position: usize) -> Option<&Stage> {
        position.checked_sub(1).and_then(|i| self.stages.get(i))
    }

    /// Output dimension of `id` (1 for the loss).
    pub fn dim_out(&self, id: ModuleId) -> Result<usize, ChainError> {
        let position = self.check_id(id)?;
        Ok(match position {
            0 => self.input.dim_x(),
            p if p <= self.stages.len() => self.stages[p - 1].module.dim_out(),
            _ => 1,
        })
    }

    /// Human-readable name and output dimension, e.g. `Linear[5]`.
    pub fn describe(&self, id: ModuleId) -> Result<String, ChainError> {
        let position = self.check_id(id)?;
        let name = match position {
            0 => "Input",
            p if p <= self.stages.len() => self.stages[p - 1].module.name(),
            _ => self.terminal.loss.name(),
        };
        Ok(format!("{}[{}]", name, self.dim_out(id)?))
    }
}

/// Builds a [`Chain`] front to back, checking every connection.
///
/// ```
/// # use gradchain_core::model::ChainBuilder;
/// # fn main() -> Result<(), gradchain_core::ChainError> {
/// let chain = ChainBuilder::new(20, 5)?
///     .seed(7)
///     .linear(5)?
///     .euclidean()?;
/// assert_eq!(chain.len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChainBuilder {
    input: InputModule,
    stages: Vec<Box<dyn Module>>,
    rng: StdRng,
    init_scale: f64,
}

impl ChainBuilder {
    /// Starts a chain whose samples have `dim_x` inputs and `dim_y` targets.
    pub fn new(dim_x: usize, dim_y: usize) -> Result<Self, ChainError> {
        Ok(ChainBuilder {
            input: InputModule::new(dim_x, dim_y)?,
            stages: Vec::new(),
            rng: StdRng::from_entropy(),
            init_scale: 1.0,
        })
    }

    /// Seeds parameter initialization for every module created afterwards.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Sets `k` in the fan-in bound `k / sqrt(dim_in)` for modules created afterwards.
    ///
    /// # Errors
    /// Returns `ChainError::InvalidScale` if `scale` is negative or not finite.
    pub fn init_scale(mut self, scale: f64) -> Result<Self, ChainError> {
        check_scale(scale)?;
        self.init_scale = scale;
        Ok(self)
    }

    /// Output dimension of the current tail.
    pub fn dim_out(&self) -> usize {
        self.stages
            .last()
            .map(|m| m.dim_out())
            .unwrap_or_else(|| self.input.dim_x())
    }

    fn tail_name(&self) -> &'static str {
        self.stages.last().map(|m| m.name()).unwrap_or("Input")
    }

    /// Checks that a successor with `dim_in` can follow the current tail.
    fn connect(&self, successor: &str, dim_in: usize) -> Result<(), ChainError> {
        let expected = self.dim_out();
        if dim_in != expected {
            return Err(ChainError::DimensionMismatch {
                predecessor: self.tail_name().to_string(),
                successor: successor.to_string(),
                expected,
                actual: dim_in,
            });
        }
        debug!(
            "ChainBuilder: connect {}[{}] -> {} at position {}",
            self.tail_name(),
            expected,
            successor,
            self.stages.len() + 1
        );
        Ok(())
    }

    /// Appends an already-built module.
    pub fn push(mut self, module: Box<dyn Module>) -> Result<Self, ChainError> {
        self.connect(module.name(), module.dim_in())?;
        self.stages.push(module);
        Ok(self)
    }

    pub fn linear(mut self, dim_out: usize) -> Result<Self, ChainError> {
        let module = Linear::new(self.dim_out(), dim_out, self.init_scale, &mut self.rng)?;
        self.push(Box::new(module))
    }

    pub fn bias(mut self) -> Result<Self, ChainError> {
        let module = Bias::new(self.dim_out(), self.init_scale, &mut self.rng)?;
        self.push(Box::new(module))
    }

    pub fn sigmoid(self) -> Result<Self, ChainError> {
        let module = Sigmoid::new(self.dim_out())?;
        self.push(Box::new(module))
    }

    pub fn softmax(mut self) -> Result<Self, ChainError> {
        let module = SoftMax::new(self.dim_out(), self.init_scale, &mut self.rng)?;
        self.push(Box::new(module))
    }

    pub fn neg_exp(mut self) -> Result<Self, ChainError> {
        let module = NegExp::new(self.dim_out(), self.init_scale, &mut self.rng)?;
        self.push(Box::new(module))
    }

    /// Appends an RBF layer over a `(dim_in, dim_out)` template matrix.
    pub fn rbf(self, templates: Tensor) -> Result<Self, ChainError> {
        if templates.rows() != self.dim_out() {
            return Err(ChainError::InvalidTemplates {
                reason: format!(
                    "template matrix has {} rows, predecessor {} outputs {}",
                    templates.rows(),
                    self.tail_name(),
                    self.dim_out()
                ),
            });
        }
        let module = Rbf::new(templates)?;
        self.push(Box::new(module))
    }

    /// Terminates the chain with `loss`.
    pub fn finish(self, loss: Box<dyn Loss>) -> Result<Chain, ChainError> {
        self.connect(loss.name(), loss.dim_in())?;
        if loss.dim_in() != self.input.dim_y() {
            return Err(ChainError::TargetDimensionMismatch {
                module: loss.name().to_string(),
                expected: loss.dim_in(),
                actual: self.input.dim_y(),
            });
        }
        debug!(
            "ChainBuilder: built chain with {} interior modules ending in {}",
            self.stages.len(),
            loss.name()
        );
        Ok(Chain {
            input: self.input,
            stages: self
                .stages
                .into_iter()
                .map(|module| Stage {
                    module,
                    activation: None,
                    input_grad: None,
                })
                .collect(),
            terminal: Terminal {
                loss,
                output: None,
                grads: None,
            },
            samples: 0,
        })
    }

    pub fn euclidean(self) -> Result<Chain, ChainError> {
        let loss = EuclideanLoss::new(self.dim_out())?;
        self.finish(Box::new(loss))
    }

    pub fn cross_entropy(self) -> Result<Chain, ChainError> {
        let loss = CrossEntropyLoss::new(self.dim_out())?;
        self.finish(Box::new(loss))
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;
