use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors surfaced by the training and inference runs. Malformed board
/// tokens are not represented here: encoding is total by contract and
/// tolerates them silently.
#[derive(Debug)]
pub enum PipelineError {
    Io(std::io::Error),
    Tch(tch::TchError),
    Artifact(String),
    EmptyOutcomePartition(&'static str),
    SingleClassLabels,
    InvalidVectorLiteral(String),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Io(err) => write!(f, "I/O error: {}", err),
            PipelineError::Tch(err) => write!(f, "Tensor error: {}", err),
            PipelineError::Artifact(msg) => write!(f, "Invalid model artifact: {}", msg),
            PipelineError::EmptyOutcomePartition(side) => {
                write!(f, "No recorded wins for the {} side; training would be meaningless", side)
            }
            PipelineError::SingleClassLabels => {
                write!(f, "Training pairs contain fewer than two label classes")
            }
            PipelineError::InvalidVectorLiteral(msg) => write!(f, "Invalid feature vector: {}", msg),
        }
    }
}

impl Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> PipelineError {
        PipelineError::Io(err)
    }
}

impl From<tch::TchError> for PipelineError {
    fn from(err: tch::TchError) -> PipelineError {
        PipelineError::Tch(err)
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> PipelineError {
        PipelineError::Artifact(err.to_string())
    }
}
