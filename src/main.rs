// Command-line front end for enrolling and verifying biometric templates

use bioguard::{
    models::{BiometricConfig, FaceDetection, Modality, QualityReport, Verification},
    processing::{
        media::{decode_image, decode_transport_payload, load_sample},
        FaceDetector, FingerprintExtractor,
    },
    security::TemplateCipher,
    storage::{FileTemplateStore, StaticCredentialIssuer},
    BiometricError, Result, TemplateManager,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bioguard")]
#[command(about = "Encrypted biometric templates: enroll, verify and manage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the encrypted template records
    #[arg(long, global = true, default_value = ".bioguard/templates")]
    store: PathBuf,

    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct CaptureArgs {
    /// Capture file (image for face/fingerprint, WAV for voice)
    #[arg(short, long)]
    input: PathBuf,

    /// Treat the input file as base64 text, optionally with a data-URL prefix
    #[arg(long)]
    base64: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll (or re-enroll) a modality for an owner
    Enroll {
        #[arg(short, long)]
        owner: String,
        #[arg(short, long)]
        modality: Modality,
        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Verify a capture against the enrolled template
    Verify {
        #[arg(short, long)]
        owner: String,
        #[arg(short, long)]
        modality: Modality,
        #[command(flatten)]
        capture: CaptureArgs,
        /// Override the configured tolerance (0-1)
        #[arg(short, long)]
        tolerance: Option<f64>,
    },

    /// Enable or disable an enrolled template
    Toggle {
        #[arg(short, long)]
        owner: String,
        #[arg(short, long)]
        modality: Modality,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Show which modalities are enrolled for an owner
    Status {
        #[arg(short, long)]
        owner: String,
    },

    /// Count faces in an image without enrolling anything
    DetectFace {
        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Grade a fingerprint capture before enrollment
    FingerprintQuality {
        #[command(flatten)]
        capture: CaptureArgs,
    },
}

fn load_config(path: Option<&Path>) -> Result<BiometricConfig> {
    let config = match path {
        Some(path) => BiometricConfig::from_json_file(path)?,
        None => BiometricConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn read_capture(capture: &CaptureArgs) -> Result<Vec<u8>> {
    let raw = std::fs::read(&capture.input).map_err(|e| {
        BiometricError::InvalidInput(format!(
            "Failed to read {}: {}",
            capture.input.display(),
            e
        ))
    })?;
    if !capture.base64 {
        return Ok(raw);
    }
    let text = std::str::from_utf8(&raw)
        .map_err(|_| BiometricError::InvalidInput("Base64 input is not UTF-8 text".to_string()))?;
    decode_transport_payload(text)
}

fn build_manager(config: BiometricConfig, store: &Path) -> Result<TemplateManager> {
    let cipher = Arc::new(TemplateCipher::new(&config.cipher)?);
    Ok(TemplateManager::new(
        config,
        cipher,
        Arc::new(FileTemplateStore::new(store)),
        Arc::new(StaticCredentialIssuer::new("bioguard-verified")),
    ))
}

fn print_verification(owner: &str, verification: &Verification) {
    println!("\n===============================================");
    println!("      BIOMETRIC VERIFICATION REPORT");
    println!("===============================================\n");
    println!("  Owner: {}", owner);
    println!("  Modality: {}", verification.modality);
    println!(
        "  Result: {}",
        if verification.success { "MATCH" } else { "NO MATCH" }
    );
    println!("  Message: {}", verification.message);

    if let Some(result) = &verification.result {
        println!("\nSCORES:");
        println!("  Confidence: {:.1}%", result.confidence);
        println!("  Similarity: {:.4}", result.similarity);
        println!("  Threshold: {:.4}", result.threshold);
        if let Some(metrics) = result.metrics {
            println!("  Cosine: {:.4}", metrics.cosine);
            println!("  Distance: {:.4}", metrics.distance);
            println!("  Correlation: {:.4}", metrics.correlation);
        }
    }
    if let Some(credential) = &verification.credential {
        println!("\nCREDENTIAL:\n  {}", credential);
    }
}

fn print_detection(detection: &FaceDetection) {
    println!("{} ({} region(s))", detection.message, detection.face_count);
    for region in &detection.regions {
        println!(
            "  - x: {}, y: {}, width: {}, height: {}",
            region.x, region.y, region.width, region.height
        );
    }
}

fn print_quality(report: &QualityReport) {
    println!("Fingerprint quality: {:?} ({:.1}/100)", report.grade, report.score);
    println!("  Sharpness: {:.1}", report.sharpness);
    println!("  Contrast: {:.1}", report.contrast);
    println!("  {}", report.message);
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Enroll {
            owner,
            modality,
            capture,
        } => {
            let sample = load_sample(modality, &read_capture(&capture)?)?;
            let receipt = build_manager(config, &cli.store)?.enroll(&owner, modality, &sample)?;
            println!(
                "Enrolled {} for {} ({} features) at {}",
                receipt.modality, receipt.owner, receipt.dimensions, receipt.enrolled_at
            );
        }

        Commands::Verify {
            owner,
            modality,
            capture,
            tolerance,
        } => {
            let sample = load_sample(modality, &read_capture(&capture)?)?;
            let verification =
                build_manager(config, &cli.store)?.verify(&owner, modality, &sample, tolerance)?;
            print_verification(&owner, &verification);
        }

        Commands::Toggle {
            owner,
            modality,
            enabled,
        } => {
            build_manager(config, &cli.store)?.toggle(&owner, modality, enabled)?;
            println!(
                "{} template for {} is now {}",
                modality,
                owner,
                if enabled { "enabled" } else { "disabled" }
            );
        }

        Commands::Status { owner } => {
            let status = build_manager(config, &cli.store)?.status(&owner)?;
            println!("Enrollment status for {}:", owner);
            for modality in Modality::ALL {
                println!(
                    "  {}: {}",
                    modality,
                    if status.get(modality) { "enrolled" } else { "not enrolled" }
                );
            }
        }

        Commands::DetectFace { capture } => {
            let image = decode_image(&read_capture(&capture)?)?;
            print_detection(&FaceDetector::new(config.face).detect(&image));
        }

        Commands::FingerprintQuality { capture } => {
            let image = decode_image(&read_capture(&capture)?)?;
            print_quality(&FingerprintExtractor::new(config.fingerprint).assess_quality(&image));
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        if err.suggests_recapture() {
            eprintln!("Please capture a new sample and try again.");
        } else if err.is_integrity_failure() {
            eprintln!("The stored template could not be opened; re-enrollment is required.");
        }
        std::process::exit(1);
    }
}
