use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::error::PipelineError;
use crate::model::traits::Transformer;
use crate::model::{tensor_to_vec, write_artifact, DEVICE};

/// Hyperparameters of the representation stage. `layer_widths` are the
/// hidden widths of the stacked RBMs, applied to the input dimension in
/// order; the last width is the embedding dimension.
#[derive(Clone, Debug)]
pub struct DbnConfig {
    pub layer_widths: Vec<i64>,
    pub learning_rate: f64,
    pub num_epochs: usize,
    pub batch_size: i64,
}

impl Default for DbnConfig {
    fn default() -> DbnConfig {
        DbnConfig {
            layer_widths: vec![337, 260, 170, 85, 45],
            learning_rate: 5e-3,
            num_epochs: 200,
            batch_size: 32,
        }
    }
}

/// One restricted Boltzmann machine of the stack.
struct RbmLayer {
    num_visible: i64,
    num_hidden: i64,
    weight: Tensor,
    visible_bias: Tensor,
    hidden_bias: Tensor,
}

impl RbmLayer {
    fn new(num_visible: i64, num_hidden: i64) -> RbmLayer {
        RbmLayer {
            num_visible,
            num_hidden,
            weight: Tensor::randn([num_visible, num_hidden], (Kind::Float, *DEVICE)) * 0.01,
            visible_bias: Tensor::zeros([num_visible], (Kind::Float, *DEVICE)),
            hidden_bias: Tensor::zeros([num_hidden], (Kind::Float, *DEVICE)),
        }
    }

    fn hidden_probabilities(&self, visible: &Tensor) -> Tensor {
        (visible.matmul(&self.weight) + &self.hidden_bias).sigmoid()
    }

    fn visible_probabilities(&self, hidden: &Tensor) -> Tensor {
        (hidden.matmul(&self.weight.transpose(0, 1)) + &self.visible_bias).sigmoid()
    }

    /// One CD-1 update on a minibatch: sample the hidden units from the
    /// data, reconstruct the visible units, and nudge the parameters toward
    /// the data statistics and away from the reconstruction statistics.
    fn contrastive_divergence(&mut self, batch: &Tensor, learning_rate: f64) {
        let positive_hidden = self.hidden_probabilities(batch);
        let hidden_sample = positive_hidden.bernoulli();
        let reconstruction = self.visible_probabilities(&hidden_sample);
        let negative_hidden = self.hidden_probabilities(&reconstruction);

        let scale = learning_rate / batch.size()[0] as f64;
        let positive_association = batch.transpose(0, 1).matmul(&positive_hidden);
        let negative_association = reconstruction.transpose(0, 1).matmul(&negative_hidden);

        self.weight = &self.weight + (positive_association - negative_association) * scale;
        self.visible_bias = &self.visible_bias
            + (batch - &reconstruction).sum_dim_intlist([0i64].as_slice(), false, Kind::Float) * scale;
        self.hidden_bias = &self.hidden_bias
            + (positive_hidden - negative_hidden).sum_dim_intlist([0i64].as_slice(), false, Kind::Float) * scale;
    }

    fn fit(&mut self, input: &Tensor, cfg: &DbnConfig) {
        let num_rows = input.size()[0];
        for _epoch in 0..cfg.num_epochs {
            let permutation = Tensor::randperm(num_rows, (Kind::Int64, input.device()));
            let shuffled = input.index_select(0, &permutation);
            let mut start = 0;
            while start < num_rows {
                let len = cfg.batch_size.min(num_rows - start);
                let batch = shuffled.narrow(0, start, len);
                self.contrastive_divergence(&batch, cfg.learning_rate);
                start += len;
            }
        }
    }

    /// The deterministic upward pass used for the transform.
    fn propagate(&self, input: &Tensor) -> Tensor {
        (input.matmul(&self.weight) + &self.hidden_bias).relu()
    }

    fn to_artifact(&self) -> Result<RbmLayerArtifact, PipelineError> {
        Ok(RbmLayerArtifact {
            num_visible: self.num_visible,
            num_hidden: self.num_hidden,
            weight: tensor_to_vec(&self.weight)?,
            visible_bias: tensor_to_vec(&self.visible_bias)?,
            hidden_bias: tensor_to_vec(&self.hidden_bias)?,
        })
    }

    fn from_artifact(artifact: &RbmLayerArtifact) -> Result<RbmLayer, PipelineError> {
        let expected = (artifact.num_visible * artifact.num_hidden) as usize;
        if artifact.weight.len() != expected
            || artifact.visible_bias.len() != artifact.num_visible as usize
            || artifact.hidden_bias.len() != artifact.num_hidden as usize
        {
            return Err(PipelineError::Artifact(format!(
                "RBM layer payload does not match its {}x{} shape",
                artifact.num_visible, artifact.num_hidden
            )));
        }
        Ok(RbmLayer {
            num_visible: artifact.num_visible,
            num_hidden: artifact.num_hidden,
            weight: Tensor::from_slice(&artifact.weight)
                .view([artifact.num_visible, artifact.num_hidden])
                .to_device(*DEVICE),
            visible_bias: Tensor::from_slice(&artifact.visible_bias).to_device(*DEVICE),
            hidden_bias: Tensor::from_slice(&artifact.hidden_bias).to_device(*DEVICE),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct RbmLayerArtifact {
    num_visible: i64,
    num_hidden: i64,
    weight: Vec<f32>,
    visible_bias: Vec<f32>,
    hidden_bias: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct DbnArtifact {
    input_dim: i64,
    layers: Vec<RbmLayerArtifact>,
}

/// The unsupervised representation stage: a stack of RBMs trained greedily
/// bottom-up, each layer on the previous layer's deterministic output.
/// Instances only exist trained (via [`Dbn::train`]) or loaded (via
/// [`Dbn::load`]), so the transform is always backed by fitted weights.
pub struct Dbn {
    input_dim: i64,
    layers: Vec<RbmLayer>,
}

impl Dbn {
    pub fn train(cfg: &DbnConfig, input_dim: i64, pool: &Tensor) -> Dbn {
        assert_eq!(pool.size().len(), 2);
        assert_eq!(pool.size()[1], input_dim);

        let mut layers = Vec::with_capacity(cfg.layer_widths.len());
        let mut input = pool.shallow_clone();
        let mut num_visible = input_dim;
        for &num_hidden in &cfg.layer_widths {
            let mut layer = RbmLayer::new(num_visible, num_hidden);
            layer.fit(&input, cfg);
            input = layer.propagate(&input);
            num_visible = num_hidden;
            layers.push(layer);
        }
        Dbn { input_dim, layers }
    }

    pub fn input_dim(&self) -> i64 {
        self.input_dim
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let layers = self
            .layers
            .iter()
            .map(RbmLayer::to_artifact)
            .collect::<Result<Vec<_>, _>>()?;
        let artifact = DbnArtifact {
            input_dim: self.input_dim,
            layers,
        };
        write_artifact(path, &bincode::serialize(&artifact)?)
    }

    pub fn load(path: &Path) -> Result<Dbn, PipelineError> {
        let payload = std::fs::read(path)?;
        let artifact: DbnArtifact = bincode::deserialize(&payload)?;
        let layers = artifact
            .layers
            .iter()
            .map(RbmLayer::from_artifact)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dbn {
            input_dim: artifact.input_dim,
            layers,
        })
    }
}

impl Transformer for Dbn {
    fn transform(&self, features: &Tensor) -> Tensor {
        let mut output = features.shallow_clone();
        for layer in &self.layers {
            output = layer.propagate(&output);
        }
        output
    }

    fn embedding_dim(&self) -> i64 {
        match self.layers.last() {
            Some(layer) => layer.num_hidden,
            None => self.input_dim,
        }
    }
}
