use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::nn::{Module, OptimizerConfig};
use tch::{nn, Kind, Tensor};

use crate::error::PipelineError;
use crate::model::traits::Classifier;
use crate::model::{tensor_to_vec, write_artifact, DEVICE};

pub const NUM_LABEL_CLASSES: i64 = 2;

/// Loss tolerance and patience of the stopping rule: training ends early
/// once this many consecutive epochs fail to improve the best loss by more
/// than the tolerance.
const LOSS_TOLERANCE: f64 = 1e-4;
const MAX_EPOCHS_WITHOUT_IMPROVEMENT: usize = 10;

/// Hyperparameters of the comparison stage.
#[derive(Clone, Debug)]
pub struct MlpConfig {
    pub hidden_widths: Vec<i64>,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: i64,
}

impl Default for MlpConfig {
    fn default() -> MlpConfig {
        MlpConfig {
            hidden_widths: vec![90, 45, 20, 2],
            learning_rate: 1e-2,
            max_epochs: 1000,
            batch_size: 200,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DenseLayerArtifact {
    num_inputs: i64,
    num_outputs: i64,
    weight: Vec<f32>,
    bias: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct MlpArtifact {
    dims: Vec<i64>,
    layers: Vec<DenseLayerArtifact>,
}

/// The supervised comparison stage: a feed-forward classifier over
/// concatenated pair embeddings, relu hidden layers and a linear two-class
/// head. Instances only exist trained or loaded.
pub struct Mlp {
    pub vs: nn::VarStore,
    layers: Vec<nn::Linear>,
    dims: Vec<i64>,
}

impl Mlp {
    fn build_layers(root: &nn::Path, dims: &[i64]) -> Vec<nn::Linear> {
        dims.windows(2)
            .enumerate()
            .map(|(i, pair)| {
                nn::linear(
                    root / format!("fc{}", i),
                    pair[0],
                    pair[1],
                    Default::default(),
                )
            })
            .collect()
    }

    fn forward(layers: &[nn::Linear], inputs: &Tensor) -> Tensor {
        let mut output = inputs.shallow_clone();
        for (i, layer) in layers.iter().enumerate() {
            output = output.apply(layer);
            if i + 1 < layers.len() {
                output = output.relu();
            }
        }
        output
    }

    /// Trains the classifier on an `[n, input_dim]` batch against one-hot
    /// `[n, 2]` labels: Adam at a fixed constant learning rate, shuffled
    /// minibatches, a hard epoch cap and the no-improvement stopping rule.
    pub fn train(
        cfg: &MlpConfig,
        input_dim: i64,
        inputs: &Tensor,
        labels: &Tensor,
    ) -> Result<Mlp, PipelineError> {
        assert_eq!(inputs.size()[1], input_dim);
        assert_eq!(labels.size(), [inputs.size()[0], NUM_LABEL_CLASSES]);

        let mut dims = Vec::with_capacity(cfg.hidden_widths.len() + 2);
        dims.push(input_dim);
        dims.extend_from_slice(&cfg.hidden_widths);
        dims.push(NUM_LABEL_CLASSES);

        let vs = nn::VarStore::new(*DEVICE);
        let layers = Mlp::build_layers(&vs.root(), &dims);
        let mut optimizer = nn::Adam::default().build(&vs, cfg.learning_rate)?;

        let targets = labels.argmax(1, false);
        let num_rows = inputs.size()[0];
        let mut best_loss = f64::INFINITY;
        let mut epochs_without_improvement = 0;

        for _epoch in 0..cfg.max_epochs {
            let permutation = Tensor::randperm(num_rows, (Kind::Int64, inputs.device()));
            let shuffled_inputs = inputs.index_select(0, &permutation);
            let shuffled_targets = targets.index_select(0, &permutation);

            let mut epoch_loss = 0.0;
            let mut start = 0;
            while start < num_rows {
                let len = cfg.batch_size.min(num_rows - start);
                let batch = shuffled_inputs.narrow(0, start, len);
                let batch_targets = shuffled_targets.narrow(0, start, len);

                let logits = Mlp::forward(&layers, &batch);
                let loss = logits.cross_entropy_loss::<Tensor>(
                    &batch_targets,
                    None,
                    tch::Reduction::Mean,
                    -100,
                    0.,
                );
                optimizer.zero_grad();
                loss.backward();
                optimizer.step();

                epoch_loss += loss.double_value(&[]) * len as f64;
                start += len;
            }
            epoch_loss /= num_rows as f64;

            if epoch_loss < best_loss - LOSS_TOLERANCE {
                best_loss = epoch_loss;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= MAX_EPOCHS_WITHOUT_IMPROVEMENT {
                    break;
                }
            }
        }

        Ok(Mlp { vs, layers, dims })
    }

    pub fn input_dim(&self) -> i64 {
        self.dims[0]
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for (layer, pair) in self.layers.iter().zip(self.dims.windows(2)) {
            layers.push(DenseLayerArtifact {
                num_inputs: pair[0],
                num_outputs: pair[1],
                weight: tensor_to_vec(&layer.ws)?,
                bias: match &layer.bs {
                    Some(bias) => tensor_to_vec(bias)?,
                    None => vec![0.0; pair[1] as usize],
                },
            });
        }
        let artifact = MlpArtifact {
            dims: self.dims.clone(),
            layers,
        };
        write_artifact(path, &bincode::serialize(&artifact)?)
    }

    pub fn load(path: &Path) -> Result<Mlp, PipelineError> {
        let payload = std::fs::read(path)?;
        let artifact: MlpArtifact = bincode::deserialize(&payload)?;
        if artifact.dims.len() != artifact.layers.len() + 1 {
            return Err(PipelineError::Artifact(
                "MLP layer count does not match its dimension list".to_string(),
            ));
        }

        let vs = nn::VarStore::new(*DEVICE);
        let root = vs.root();
        let mut layers = Vec::with_capacity(artifact.layers.len());
        for (i, layer) in artifact.layers.iter().enumerate() {
            let expected = (layer.num_inputs * layer.num_outputs) as usize;
            if layer.weight.len() != expected || layer.bias.len() != layer.num_outputs as usize {
                return Err(PipelineError::Artifact(format!(
                    "dense layer payload does not match its {}x{} shape",
                    layer.num_outputs, layer.num_inputs
                )));
            }
            let sub = &root / format!("fc{}", i);
            let ws = sub.var_copy(
                "weight",
                &Tensor::from_slice(&layer.weight).view([layer.num_outputs, layer.num_inputs]),
            );
            let bs = sub.var_copy("bias", &Tensor::from_slice(&layer.bias));
            layers.push(nn::Linear { ws, bs: Some(bs) });
        }
        Ok(Mlp {
            vs,
            layers,
            dims: artifact.dims,
        })
    }
}

impl Classifier for Mlp {
    fn predict(&self, inputs: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let predicted = Mlp::forward(&self.layers, inputs).argmax(1, false);
            Tensor::eye(NUM_LABEL_CLASSES, (Kind::Float, inputs.device())).index_select(0, &predicted)
        })
    }

    fn score(&self, inputs: &Tensor, labels: &Tensor) -> f64 {
        tch::no_grad(|| {
            let predicted = Mlp::forward(&self.layers, inputs).argmax(1, false);
            let expected = labels.argmax(1, false);
            predicted
                .eq_tensor(&expected)
                .to_kind(Kind::Float)
                .mean(Kind::Float)
                .double_value(&[])
        })
    }
}
