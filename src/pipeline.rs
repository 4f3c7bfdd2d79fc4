//! Drives the two-stage pipeline: dataset construction, representation and
//! comparator training with a held-out evaluation, and pair inference on
//! the persisted artifacts.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::{Device, Kind, Tensor};

use crate::board::NUM_FEATURE_BITS;
use crate::dataset::{self, PairDataset, TrainingPair, FIRST_WINS, SECOND_WINS};
use crate::error::PipelineError;
use crate::model::{
    features_to_tensor, Classifier, Dbn, DbnConfig, Mlp, MlpConfig, Transformer, DEVICE,
    NUM_LABEL_CLASSES,
};

pub const DATA_FILE: &str = "data/data.csv";
pub const DBN_MODEL_FILE: &str = "dbn_model.bin";
pub const MLP_MODEL_FILE: &str = "mlp_model.bin";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub dbn_path: PathBuf,
    pub mlp_path: PathBuf,
    pub dbn: DbnConfig,
    pub mlp: MlpConfig,
    /// Fraction of the labeled pairs held out for evaluation.
    pub test_fraction: f64,
    /// Seeds the split shuffle and model initialization when set; `None`
    /// keeps entropy-seeded, non-reproducible runs.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            data_path: PathBuf::from(DATA_FILE),
            dbn_path: PathBuf::from(DBN_MODEL_FILE),
            mlp_path: PathBuf::from(MLP_MODEL_FILE),
            dbn: DbnConfig::default(),
            mlp: MlpConfig::default(),
            test_fraction: 0.25,
            seed: None,
        }
    }
}

#[derive(Debug)]
pub struct TrainReport {
    pub pool_size: usize,
    pub num_pairs: usize,
    pub num_train: usize,
    pub num_test: usize,
    pub accuracy: f64,
}

fn check_label_classes(pairs: &[TrainingPair]) -> Result<(), PipelineError> {
    let has_first = pairs.iter().any(|pair| pair.label == FIRST_WINS);
    let has_second = pairs.iter().any(|pair| pair.label == SECOND_WINS);
    if has_first && has_second {
        Ok(())
    } else {
        Err(PipelineError::SingleClassLabels)
    }
}

/// Embeds both positions of every pair and concatenates the embeddings into
/// the classifier input batch, alongside the one-hot label batch.
fn embed_pairs<T: Transformer>(transformer: &T, pairs: &[TrainingPair]) -> (Tensor, Tensor) {
    let firsts: Vec<_> = pairs.iter().map(|pair| pair.first).collect();
    let seconds: Vec<_> = pairs.iter().map(|pair| pair.second).collect();
    let first_embeddings = transformer.transform(&features_to_tensor(&firsts));
    let second_embeddings = transformer.transform(&features_to_tensor(&seconds));
    let inputs = Tensor::cat(&[first_embeddings, second_embeddings], 1);

    let mut flat_labels = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        flat_labels.extend_from_slice(&pair.label);
    }
    let labels = Tensor::from_slice(&flat_labels)
        .view([pairs.len() as i64, NUM_LABEL_CLASSES])
        .to_device(*DEVICE);
    (inputs, labels)
}

/// Classifies one ordered position pair through the trained stages and
/// returns the flattened one-hot label.
pub fn predict_pair<T: Transformer, C: Classifier>(
    transformer: &T,
    classifier: &C,
    first: &[f32],
    second: &[f32],
) -> Result<Vec<i64>, PipelineError> {
    let first_tensor = Tensor::from_slice(first)
        .view([1, first.len() as i64])
        .to_device(*DEVICE);
    let second_tensor = Tensor::from_slice(second)
        .view([1, second.len() as i64])
        .to_device(*DEVICE);
    let inputs = Tensor::cat(
        &[
            transformer.transform(&first_tensor),
            transformer.transform(&second_tensor),
        ],
        1,
    );
    let label = classifier
        .predict(&inputs)
        .view([-1])
        .to_kind(Kind::Int64)
        .to_device(Device::Cpu);
    Ok(Vec::<i64>::try_from(&label)?)
}

/// Runs the full training sequence: read records, build and split the pair
/// dataset, fit the representation on the whole pool, fit the comparator on
/// the embedded training pairs, evaluate on the held-out pairs and persist
/// both artifacts. Every stage failure aborts the run.
pub fn run_training(cfg: &PipelineConfig) -> Result<TrainReport, PipelineError> {
    if let Some(seed) = cfg.seed {
        tch::manual_seed(seed as i64);
    }
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("Reading records from {}...", cfg.data_path.display());
    let raw = std::fs::read_to_string(&cfg.data_path)?;
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    println!("Building the pair dataset...");
    let PairDataset {
        pool,
        pairs,
        num_gaul_wins,
        num_roman_wins,
    } = dataset::build(&lines);
    if num_gaul_wins == 0 {
        return Err(PipelineError::EmptyOutcomePartition("Gaul"));
    }
    if num_roman_wins == 0 {
        return Err(PipelineError::EmptyOutcomePartition("Roman"));
    }
    let num_pairs = pairs.len();
    let (train_pairs, test_pairs) = dataset::split_pairs(pairs, cfg.test_fraction, &mut rng);
    check_label_classes(&train_pairs)?;

    println!("Training the representation on {} positions...", pool.len());
    let pool_tensor = features_to_tensor(&pool);
    let dbn = Dbn::train(&cfg.dbn, NUM_FEATURE_BITS as i64, &pool_tensor);

    println!("Training the comparator on {} pairs...", train_pairs.len());
    let (train_inputs, train_labels) = embed_pairs(&dbn, &train_pairs);
    let mlp = Mlp::train(
        &cfg.mlp,
        dbn.embedding_dim() * 2,
        &train_inputs,
        &train_labels,
    )?;

    println!("Evaluating on {} held-out pairs...", test_pairs.len());
    let accuracy = if test_pairs.is_empty() {
        f64::NAN
    } else {
        let (test_inputs, test_labels) = embed_pairs(&dbn, &test_pairs);
        mlp.score(&test_inputs, &test_labels)
    };

    dbn.save(&cfg.dbn_path)?;
    mlp.save(&cfg.mlp_path)?;
    println!(
        "Saved model artifacts to {} and {}",
        cfg.dbn_path.display(),
        cfg.mlp_path.display()
    );

    Ok(TrainReport {
        pool_size: pool.len(),
        num_pairs,
        num_train: train_pairs.len(),
        num_test: test_pairs.len(),
        accuracy,
    })
}

/// Loads both artifacts and classifies one pre-encoded position pair.
pub fn run_inference(
    cfg: &PipelineConfig,
    first: &[f32],
    second: &[f32],
) -> Result<Vec<i64>, PipelineError> {
    let dbn = Dbn::load(&cfg.dbn_path)?;
    let mlp = Mlp::load(&cfg.mlp_path)?;
    predict_pair(&dbn, &mlp, first, second)
}

/// Parses a bracketed comma-separated integer list (`[0, 1, 0, ...]`) into
/// a feature vector of the expected dimension.
pub fn parse_vector_literal(arg: &str) -> Result<Vec<f32>, PipelineError> {
    let inner = arg
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            PipelineError::InvalidVectorLiteral(format!("expected a bracketed list, got `{}`", arg))
        })?;

    let mut values = Vec::with_capacity(NUM_FEATURE_BITS);
    for part in inner.split(',') {
        let value: i64 = part.trim().parse().map_err(|_| {
            PipelineError::InvalidVectorLiteral(format!("`{}` is not an integer", part.trim()))
        })?;
        values.push(value as f32);
    }
    if values.len() != NUM_FEATURE_BITS {
        return Err(PipelineError::InvalidVectorLiteral(format!(
            "expected {} entries, got {}",
            NUM_FEATURE_BITS,
            values.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::encode;

    const HEADER: &str = "POSITION;GAUL_WINS;ROMAN_WINS";

    fn small_dbn_config() -> DbnConfig {
        DbnConfig {
            layer_widths: vec![16],
            learning_rate: 5e-3,
            num_epochs: 5,
            batch_size: 2,
        }
    }

    fn small_mlp_config() -> MlpConfig {
        MlpConfig {
            hidden_widths: vec![8],
            learning_rate: 1e-2,
            max_epochs: 1000,
            batch_size: 4,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_end_to_end_recovers_the_winner_ordering() {
        tch::manual_seed(13);
        let gaul_token = "tttttttt/8/8/8/8/8/8 g";
        let roman_token = "8/8/8/8/8/8/CCCCCCCC r";
        let lines = vec![
            HEADER.to_string(),
            format!("{};1;0", gaul_token),
            format!("{};0;1", roman_token),
        ];

        let dataset = dataset::build(&lines);
        assert_eq!(dataset.pairs.len(), 2);

        let pool_tensor = features_to_tensor(&dataset.pool);
        let dbn = Dbn::train(&small_dbn_config(), NUM_FEATURE_BITS as i64, &pool_tensor);
        let (inputs, labels) = embed_pairs(&dbn, &dataset.pairs);
        let mlp = Mlp::train(&small_mlp_config(), dbn.embedding_dim() * 2, &inputs, &labels)
            .expect("Failed to train comparator");

        assert_eq!(mlp.score(&inputs, &labels), 1.0);

        let gaul_position = encode(gaul_token);
        let roman_position = encode(roman_token);
        let label = predict_pair(&dbn, &mlp, &gaul_position, &roman_position)
            .expect("Failed to predict");
        assert_eq!(label, vec![1, 0]);
        let label = predict_pair(&dbn, &mlp, &roman_position, &gaul_position)
            .expect("Failed to predict");
        assert_eq!(label, vec![0, 1]);
    }

    #[test]
    fn test_training_run_reports_and_persists() {
        let data_path = temp_path("pipeline_data.csv");
        let mut lines = vec![HEADER.to_string()];
        for i in 0..3 {
            lines.push(format!("{}t{}/8/8/8/8/8/8 g;1;0", i, 6 - i));
            lines.push(format!("8/8/8/8/8/8/{}C{} r;0;1", i, 6 - i));
        }
        std::fs::write(&data_path, lines.join("\n")).expect("Failed to write records");

        let cfg = PipelineConfig {
            data_path: data_path.clone(),
            dbn_path: temp_path("pipeline_dbn.bin"),
            mlp_path: temp_path("pipeline_mlp.bin"),
            dbn: small_dbn_config(),
            mlp: MlpConfig {
                max_epochs: 50,
                ..small_mlp_config()
            },
            test_fraction: 0.25,
            seed: Some(17),
        };

        let report = run_training(&cfg).expect("Training run failed");
        assert_eq!(report.pool_size, 6);
        assert_eq!(report.num_pairs, 2 * 3 * 3);
        assert_eq!(report.num_test, 5); // round(18 * 0.25)
        assert_eq!(report.num_train, 13);
        assert!(report.accuracy >= 0.0 && report.accuracy <= 1.0);

        // Both artifacts must be loadable and usable together.
        let probe = encode("w7/8/8/8/8/8/8 r");
        let label = run_inference(&cfg, &probe, &probe).expect("Inference failed");
        assert_eq!(label.iter().sum::<i64>(), 1);

        std::fs::remove_file(&cfg.data_path).ok();
        std::fs::remove_file(&cfg.dbn_path).ok();
        std::fs::remove_file(&cfg.mlp_path).ok();
    }

    #[test]
    fn test_empty_partition_is_a_configuration_error() {
        let data_path = temp_path("pipeline_one_sided.csv");
        let lines = vec![HEADER.to_string(), "w7/8/8/8/8/8/8 r;1;0".to_string()];
        std::fs::write(&data_path, lines.join("\n")).expect("Failed to write records");

        let cfg = PipelineConfig {
            data_path: data_path.clone(),
            ..PipelineConfig::default()
        };
        let result = run_training(&cfg);
        std::fs::remove_file(&data_path).ok();
        assert!(matches!(
            result,
            Err(PipelineError::EmptyOutcomePartition("Roman"))
        ));
    }

    #[test]
    fn test_missing_data_file_is_fatal() {
        let cfg = PipelineConfig {
            data_path: PathBuf::from("no/such/records.csv"),
            ..PipelineConfig::default()
        };
        assert!(matches!(run_training(&cfg), Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_parse_vector_literal() {
        let literal = format!("[{}]", vec!["0"; NUM_FEATURE_BITS].join(", "));
        let values = parse_vector_literal(&literal).expect("Failed to parse");
        assert_eq!(values.len(), NUM_FEATURE_BITS);
        assert!(values.iter().all(|&v| v == 0.0));

        assert!(matches!(
            parse_vector_literal("0, 1, 0"),
            Err(PipelineError::InvalidVectorLiteral(_))
        ));
        assert!(matches!(
            parse_vector_literal("[1, 0]"),
            Err(PipelineError::InvalidVectorLiteral(_))
        ));
        assert!(matches!(
            parse_vector_literal("[1, x, 0]"),
            Err(PipelineError::InvalidVectorLiteral(_))
        ));
    }
}
