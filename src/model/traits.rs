use tch::Tensor;

/// A trained representation stage: a deterministic map from feature-vector
/// batches to embedding batches. Implementations are constructed by training
/// or by loading a persisted artifact, so a transform can never run on an
/// unfitted model.
pub trait Transformer {
    /// Maps an `[n, input_dim]` batch to an `[n, embedding_dim]` batch.
    fn transform(&self, features: &Tensor) -> Tensor;

    fn embedding_dim(&self) -> i64;
}

/// A trained comparison stage over concatenated pair embeddings.
pub trait Classifier {
    /// Maps an `[n, input_dim]` batch to one-hot `[n, 2]` label rows.
    fn predict(&self, inputs: &Tensor) -> Tensor;

    /// Mean label accuracy of `predict` against one-hot `labels`, in [0, 1].
    fn score(&self, inputs: &Tensor, labels: &Tensor) -> f64;
}
