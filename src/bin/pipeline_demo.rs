use bioguard::models::{BiometricConfig, Modality};
use bioguard::processing::{synthetic, Sample};
use bioguard::security::TemplateCipher;
use bioguard::storage::{MemoryTemplateStore, StaticCredentialIssuer};
use bioguard::{Result, TemplateManager};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Biometric Pipeline Demo");
    println!("-----------------------");

    let config = BiometricConfig::default().with_env_overrides();
    let cipher = Arc::new(TemplateCipher::new(&config.cipher)?);
    let manager = TemplateManager::new(
        config,
        cipher,
        Arc::new(MemoryTemplateStore::new()),
        Arc::new(StaticCredentialIssuer::new("demo")),
    );

    println!("Enrolling synthetic face...");
    let receipt = manager.enroll("demo-user", Modality::Face, &Sample::Image(synthetic::face_image()))?;
    println!("  Stored {} features at {}", receipt.dimensions, receipt.enrolled_at);

    let probes = [
        ("same face", synthetic::face_image()),
        ("same face, brighter", synthetic::brighter_face_image(15)),
        ("different face", synthetic::different_face_image()),
    ];
    for (label, image) in probes {
        let verification = manager.verify("demo-user", Modality::Face, &Sample::Image(image), None)?;
        let confidence = verification.result.as_ref().map_or(0.0, |r| r.confidence);
        println!(
            "  {:<22} {} (confidence {:.1}%)",
            label,
            if verification.success { "MATCH" } else { "NO MATCH" },
            confidence
        );
    }

    println!("Checking a frame with two faces...");
    match manager.verify(
        "demo-user",
        Modality::Face,
        &Sample::Image(synthetic::two_faces_image()),
        None,
    ) {
        Ok(_) => println!("  Unexpectedly accepted"),
        Err(err) => println!("  Rejected: {}", err),
    }

    println!("Checking voice status before enrollment...");
    let voice = manager.verify(
        "demo-user",
        Modality::Voice,
        &Sample::Audio(synthetic::tone(180.0, 1.0, 16000)),
        None,
    )?;
    println!("  voice: {}", voice.message);
    Ok(())
}
