use crate::matching::DecisionPolicy;
use crate::models::{
    BiometricConfig, EncryptedTemplate, EnrollmentReceipt, EnrollmentStatus, Modality,
    StoredTemplate, Verification,
};
use crate::processing::{
    FaceExtractor, FeatureExtractor, FingerprintExtractor, Sample, VoiceExtractor,
};
use crate::security::{FeatureCodec, TemplateCipher};
use crate::storage::{CredentialIssuer, TemplateStore};
use crate::utils::{BiometricError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Enrollment and verification across modalities.
///
/// Per (owner, modality) the only state is the stored record: a template is
/// either absent (not enrolled) or present, and a present template can be
/// disabled without being deleted. Templates are encrypted before they reach
/// the store and decrypted only inside [`TemplateManager::verify`].
pub struct TemplateManager {
    config: BiometricConfig,
    cipher: Arc<TemplateCipher>,
    store: Arc<dyn TemplateStore>,
    issuer: Arc<dyn CredentialIssuer>,
    extractors: HashMap<Modality, Box<dyn FeatureExtractor>>,
}

impl TemplateManager {
    pub fn new(
        config: BiometricConfig,
        cipher: Arc<TemplateCipher>,
        store: Arc<dyn TemplateStore>,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> Self {
        let mut extractors: HashMap<Modality, Box<dyn FeatureExtractor>> = HashMap::new();
        extractors.insert(
            Modality::Face,
            Box::new(FaceExtractor::new(config.face.clone())),
        );
        extractors.insert(
            Modality::Fingerprint,
            Box::new(FingerprintExtractor::new(config.fingerprint.clone())),
        );
        extractors.insert(
            Modality::Voice,
            Box::new(VoiceExtractor::new(config.voice.clone())),
        );
        TemplateManager {
            config,
            cipher,
            store,
            issuer,
            extractors,
        }
    }

    /// Replace the extractor registered for `extractor.modality()`.
    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractors.insert(extractor.modality(), extractor);
        self
    }

    pub fn config(&self) -> &BiometricConfig {
        &self.config
    }

    fn extractor(&self, modality: Modality) -> Result<&dyn FeatureExtractor> {
        self.extractors
            .get(&modality)
            .map(|extractor| &**extractor)
            .ok_or(BiometricError::ExtractorUnavailable(modality))
    }

    fn check_owner(owner: &str) -> Result<()> {
        if owner.trim().is_empty() {
            return Err(BiometricError::InvalidInput(
                "owner id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Extract, serialize and encrypt a template, then store it. An existing
    /// template is replaced and re-enabled. Nothing is written unless every
    /// step before the store succeeds.
    pub fn enroll(&self, owner: &str, modality: Modality, sample: &Sample) -> Result<EnrollmentReceipt> {
        Self::check_owner(owner)?;

        // Step 1: Extract the feature vector
        let vector = self.extractor(modality)?.extract(sample)?;

        // Step 2: Serialize and seal it
        let plaintext = FeatureCodec::serialize(&vector)?;
        let blob = self.cipher.encrypt(plaintext.as_bytes())?;

        // Step 3: Store the sealed record
        let now = Utc::now().to_rfc3339();
        let record = StoredTemplate {
            template: EncryptedTemplate::new(blob),
            enabled: true,
            enrolled_at: now.clone(),
            updated_at: now.clone(),
        };
        self.store.put_template(owner, modality, record)?;

        log::info!(
            "Enrolled {} template for {} ({} dimensions)",
            modality,
            owner,
            vector.len()
        );
        Ok(EnrollmentReceipt {
            owner: owner.to_string(),
            modality,
            dimensions: vector.len(),
            enrolled_at: now,
        })
    }

    /// Compare a fresh capture against the stored template.
    ///
    /// A missing or disabled template yields an unsuccessful `not enrolled`
    /// verification without running the extractor. A template that fails to
    /// decrypt or parse aborts with that error; it is never scored.
    pub fn verify(
        &self,
        owner: &str,
        modality: Modality,
        sample: &Sample,
        tolerance: Option<f64>,
    ) -> Result<Verification> {
        Self::check_owner(owner)?;
        let policy = DecisionPolicy::from_scoring(self.config.scoring(modality), tolerance)?;

        let record = match self.store.get_template(owner, modality)? {
            Some(record) if record.enabled => record,
            Some(_) => {
                log::warn!("{} template for {} is disabled", modality, owner);
                return Ok(Verification::not_enrolled(modality));
            }
            None => {
                log::warn!("No {} template enrolled for {}", modality, owner);
                return Ok(Verification::not_enrolled(modality));
            }
        };

        // Step 1: Open the stored template
        let plaintext = self.cipher.decrypt(record.template.as_str()).map_err(|e| {
            log::warn!("Stored {} template for {} failed to decrypt", modality, owner);
            e
        })?;
        let enrolled = FeatureCodec::deserialize_bytes(&plaintext)?;

        // Step 2: Extract the probe and score it
        let probe = self.extractor(modality)?.extract(sample)?;
        let result = policy.evaluate(&enrolled, &probe);

        // Step 3: Upgrade the credential only on a match
        let credential = if result.success {
            Some(self.issuer.issue_verified_credential(owner, modality)?)
        } else {
            None
        };

        log::info!(
            "{} verification for {}: {} (confidence {:.1}%, threshold {:.1}%)",
            modality,
            owner,
            if result.success { "match" } else { "no match" },
            result.confidence,
            result.threshold * 100.0
        );
        Ok(Verification {
            modality,
            success: result.success,
            message: if result.success {
                "verified".to_string()
            } else {
                "biometric did not match".to_string()
            },
            result: Some(result),
            credential,
        })
    }

    /// Enable or disable a stored template without touching its bytes.
    pub fn toggle(&self, owner: &str, modality: Modality, enabled: bool) -> Result<()> {
        Self::check_owner(owner)?;
        let mut record = self
            .store
            .get_template(owner, modality)?
            .ok_or_else(|| BiometricError::TemplateNotFound {
                owner: owner.to_string(),
                modality,
            })?;
        record.enabled = enabled;
        record.updated_at = Utc::now().to_rfc3339();
        self.store.put_template(owner, modality, record)?;

        log::info!(
            "{} template for {} {}",
            modality,
            owner,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Which modalities currently have an enabled template.
    pub fn status(&self, owner: &str) -> Result<EnrollmentStatus> {
        Self::check_owner(owner)?;
        let mut status = EnrollmentStatus::default();
        for modality in Modality::ALL {
            let enrolled = self
                .store
                .get_template(owner, modality)?
                .map_or(false, |record| record.enabled);
            status.set(modality, enrolled);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CipherConfig, FeatureVector};
    use crate::processing::synthetic;
    use crate::storage::{MemoryTemplateStore, StaticCredentialIssuer};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn cipher(secret: &str) -> Arc<TemplateCipher> {
        Arc::new(
            TemplateCipher::new(&CipherConfig {
                secret: secret.to_string(),
                salt: "test-salt".to_string(),
            })
            .unwrap(),
        )
    }

    fn manager_with(store: Arc<MemoryTemplateStore>, secret: &str) -> TemplateManager {
        TemplateManager::new(
            BiometricConfig::default(),
            cipher(secret),
            store,
            Arc::new(StaticCredentialIssuer::new("verified")),
        )
    }

    fn manager() -> (TemplateManager, Arc<MemoryTemplateStore>) {
        let store = Arc::new(MemoryTemplateStore::new());
        (manager_with(store.clone(), "test-secret"), store)
    }

    /// Returns queued vectors in order and counts calls.
    struct ScriptedExtractor {
        modality: Modality,
        outputs: Mutex<Vec<FeatureVector>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedExtractor {
        fn new(modality: Modality, outputs: Vec<Vec<f64>>, calls: Arc<AtomicUsize>) -> Box<Self> {
            let mut outputs: Vec<FeatureVector> = outputs.into_iter().map(FeatureVector::new).collect();
            outputs.reverse();
            Box::new(ScriptedExtractor {
                modality,
                outputs: Mutex::new(outputs),
                calls,
            })
        }
    }

    impl FeatureExtractor for ScriptedExtractor {
        fn modality(&self) -> Modality {
            self.modality
        }

        fn extract(&self, _sample: &Sample) -> Result<FeatureVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outputs = self.outputs.lock().unwrap();
            Ok(outputs.pop().expect("extractor called more often than scripted"))
        }
    }

    struct PanickingExtractor(Modality);

    impl FeatureExtractor for PanickingExtractor {
        fn modality(&self) -> Modality {
            self.0
        }

        fn extract(&self, _sample: &Sample) -> Result<FeatureVector> {
            panic!("extractor must not run for an unenrolled modality");
        }
    }

    fn any_sample() -> Sample {
        Sample::Audio(synthetic::tone(200.0, 1.0, 8000))
    }

    #[test]
    fn test_not_enrolled_skips_extraction() {
        let (manager, _) = manager();
        let manager = manager.with_extractor(Box::new(PanickingExtractor(Modality::Voice)));

        let verification = manager
            .verify("alice", Modality::Voice, &any_sample(), None)
            .unwrap();
        assert!(!verification.success);
        assert_eq!(verification.message, "not enrolled");
        assert!(verification.result.is_none());
        assert!(verification.credential.is_none());
    }

    #[test]
    fn test_face_end_to_end() {
        let (manager, store) = manager();
        let face = Sample::Image(synthetic::face_image());

        let receipt = manager.enroll("alice", Modality::Face, &face).unwrap();
        assert_eq!(receipt.dimensions, 1120);
        assert_eq!(store.len().unwrap(), 1);
        let stored = store.get_template("alice", Modality::Face).unwrap().unwrap();
        assert!(stored.enabled);
        assert!(!stored.template.as_str().contains('['));

        let verification = manager.verify("alice", Modality::Face, &face, None).unwrap();
        assert!(verification.success);
        let result = verification.result.unwrap();
        assert!(result.confidence >= result.threshold * 100.0);
        let credential = verification.credential.unwrap();
        assert!(credential.starts_with("verified.alice.face."));

        let stranger = Sample::Image(synthetic::different_face_image());
        let verification = manager.verify("alice", Modality::Face, &stranger, None).unwrap();
        assert!(!verification.success);
        assert!(verification.result.is_some());
        assert!(verification.credential.is_none());
    }

    #[test]
    fn test_fingerprint_end_to_end() {
        let (manager, store) = manager();
        let whorl = Sample::Image(synthetic::whorl_image(256, 10.0));

        let receipt = manager.enroll("bruno", Modality::Fingerprint, &whorl).unwrap();
        assert_eq!(receipt.dimensions, 427);
        assert!(store.get_template("bruno", Modality::Fingerprint).unwrap().is_some());

        let verification = manager.verify("bruno", Modality::Fingerprint, &whorl, None).unwrap();
        assert!(verification.success);
        let credential = verification.credential.unwrap();
        assert!(credential.starts_with("verified.bruno.fingerprint."));

        let others = [
            synthetic::ridge_image(256, 7.0, 45.0),
            synthetic::whorl_image(256, 6.0),
        ];
        for image in others {
            let verification = manager
                .verify("bruno", Modality::Fingerprint, &Sample::Image(image), None)
                .unwrap();
            assert!(!verification.success, "{:?}", verification.result);
            assert!(verification.result.is_some());
            assert!(verification.credential.is_none());
        }
    }

    #[test]
    fn test_voice_end_to_end() {
        let (manager, store) = manager();
        let low = Sample::Audio(synthetic::tone(220.0, 1.0, 8000));

        let receipt = manager.enroll("cleo", Modality::Voice, &low).unwrap();
        assert_eq!(receipt.dimensions, 195);
        assert_eq!(store.len().unwrap(), 1);

        let verification = manager.verify("cleo", Modality::Voice, &low, None).unwrap();
        assert!(verification.success);
        let credential = verification.credential.unwrap();
        assert!(credential.starts_with("verified.cleo.voice."));

        let high = Sample::Audio(synthetic::tone(1800.0, 1.0, 8000));
        let verification = manager.verify("cleo", Modality::Voice, &high, None).unwrap();
        assert!(!verification.success);
        assert!(verification.result.is_some());
        assert!(verification.credential.is_none());
    }

    #[test]
    fn test_multiple_faces_rejected_on_both_paths() {
        let (manager, store) = manager();
        let crowd = Sample::Image(synthetic::two_faces_image());

        let err = manager.enroll("alice", Modality::Face, &crowd).unwrap_err();
        assert!(matches!(err, BiometricError::MultipleFacesDetected(2)));
        assert!(store.is_empty().unwrap());

        manager
            .enroll("alice", Modality::Face, &Sample::Image(synthetic::face_image()))
            .unwrap();
        let err = manager
            .verify("alice", Modality::Face, &crowd, None)
            .unwrap_err();
        assert!(matches!(err, BiometricError::MultipleFacesDetected(2)));
        assert!(err.suggests_recapture());
    }

    #[test]
    fn test_toggle_hides_but_keeps_template() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (manager, store) = manager();
        let vector = vec![0.2, 0.4, 0.1, 0.9];
        let manager = manager.with_extractor(ScriptedExtractor::new(
            Modality::Fingerprint,
            vec![vector.clone(), vector.clone()],
            calls.clone(),
        ));

        manager.enroll("bob", Modality::Fingerprint, &any_sample()).unwrap();
        let before = store.get_template("bob", Modality::Fingerprint).unwrap().unwrap();

        manager.toggle("bob", Modality::Fingerprint, false).unwrap();
        let after = store.get_template("bob", Modality::Fingerprint).unwrap().unwrap();
        assert!(!after.enabled);
        assert_eq!(after.template, before.template);
        assert!(!manager.status("bob").unwrap().fingerprint);

        let hidden = manager
            .verify("bob", Modality::Fingerprint, &any_sample(), None)
            .unwrap();
        assert_eq!(hidden.message, "not enrolled");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        manager.toggle("bob", Modality::Fingerprint, true).unwrap();
        assert!(manager.status("bob").unwrap().fingerprint);
        let verification = manager
            .verify("bob", Modality::Fingerprint, &any_sample(), None)
            .unwrap();
        assert!(verification.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_toggle_missing_template() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.toggle("carol", Modality::Voice, true),
            Err(BiometricError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_tampered_template_is_integrity_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (manager, store) = manager();
        let manager = manager.with_extractor(ScriptedExtractor::new(
            Modality::Voice,
            vec![vec![1.0, 2.0, 3.0]],
            calls.clone(),
        ));
        manager.enroll("dave", Modality::Voice, &any_sample()).unwrap();

        let mut record = store.get_template("dave", Modality::Voice).unwrap().unwrap();
        let mut raw = STANDARD.decode(record.template.as_str()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        record.template = EncryptedTemplate::new(STANDARD.encode(raw));
        store.put_template("dave", Modality::Voice, record).unwrap();

        let err = manager
            .verify("dave", Modality::Voice, &any_sample(), None)
            .unwrap_err();
        assert!(matches!(err, BiometricError::DecryptionError(_)));
        assert!(err.is_integrity_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_template_sealed_under_other_key() {
        let store = Arc::new(MemoryTemplateStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        manager_with(store.clone(), "first-secret")
            .with_extractor(ScriptedExtractor::new(Modality::Voice, vec![vec![0.5, 0.5, 1.0]], calls))
            .enroll("erin", Modality::Voice, &any_sample())
            .unwrap();

        let err = manager_with(store, "second-secret")
            .verify("erin", Modality::Voice, &any_sample(), None)
            .unwrap_err();
        assert!(matches!(err, BiometricError::DecryptionError(_)));
    }

    #[test]
    fn test_tolerance_override() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (manager, _) = manager();
        let manager = manager.with_extractor(ScriptedExtractor::new(
            Modality::Face,
            vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 1.0]],
            calls,
        ));
        manager.enroll("frank", Modality::Face, &any_sample()).unwrap();

        let strict = manager
            .verify("frank", Modality::Face, &any_sample(), None)
            .unwrap();
        assert!(!strict.success);
        let similarity = strict.result.unwrap().similarity;
        assert!(similarity > 0.55 && similarity < 0.7, "similarity {}", similarity);

        let relaxed = manager
            .verify("frank", Modality::Face, &any_sample(), Some(0.5))
            .unwrap();
        assert!(relaxed.success);
        assert!((relaxed.result.unwrap().threshold - 0.5).abs() < 1e-12);

        assert!(matches!(
            manager.verify("frank", Modality::Face, &any_sample(), Some(1.5)),
            Err(BiometricError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reenroll_overwrites_and_reenables() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (manager, store) = manager();
        let manager = manager.with_extractor(ScriptedExtractor::new(
            Modality::Voice,
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]],
            calls,
        ));
        manager.enroll("gina", Modality::Voice, &any_sample()).unwrap();
        manager.toggle("gina", Modality::Voice, false).unwrap();
        manager.enroll("gina", Modality::Voice, &any_sample()).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(manager.status("gina").unwrap().voice);
        let verification = manager
            .verify("gina", Modality::Voice, &any_sample(), None)
            .unwrap();
        assert!(verification.success);
    }

    #[test]
    fn test_status_and_owner_validation() {
        let (manager, _) = manager();
        manager
            .enroll("hank", Modality::Face, &Sample::Image(synthetic::face_image()))
            .unwrap();
        assert_eq!(
            manager.status("hank").unwrap(),
            EnrollmentStatus {
                face: true,
                fingerprint: false,
                voice: false
            }
        );
        assert!(matches!(
            manager.enroll("  ", Modality::Face, &any_sample()),
            Err(BiometricError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_voice_too_short_surfaces_from_enroll() {
        let (manager, store) = manager();
        let clip = Sample::Audio(synthetic::tone(300.0, 0.1, 16000));
        let err = manager.enroll("ivy", Modality::Voice, &clip).unwrap_err();
        assert!(matches!(err, BiometricError::AudioTooShort { .. }));
        assert!(store.is_empty().unwrap());
    }
}
