use murus::error::PipelineError;
use murus::pipeline::{self, PipelineConfig};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let cfg = PipelineConfig::default();

    let result = if args.len() > 1 && args[1] == "predict" {
        predict(&cfg, &args[2..])
    } else {
        train(&cfg)
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn predict(cfg: &PipelineConfig, vector_args: &[String]) -> Result<(), PipelineError> {
    if vector_args.len() != 2 {
        return Err(PipelineError::InvalidVectorLiteral(
            "predict takes exactly two bracketed feature vectors".to_string(),
        ));
    }
    let first = pipeline::parse_vector_literal(&vector_args[0])?;
    let second = pipeline::parse_vector_literal(&vector_args[1])?;
    let label = pipeline::run_inference(cfg, &first, &second)?;
    println!("[{}, {}]", label[0], label[1]);
    Ok(())
}

fn train(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    let report = pipeline::run_training(cfg)?;
    println!(
        "Trained on {} pairs ({} train / {} test) over a pool of {} positions",
        report.num_pairs, report.num_train, report.num_test, report.pool_size
    );
    println!("Held-out accuracy: {:.4}", report.accuracy);
    Ok(())
}
