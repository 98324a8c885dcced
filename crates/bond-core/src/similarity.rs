//! ============================================================================
//! Similarity Service - Score two stored profiles
//! ============================================================================
//! Loads both vectors and computes cosine similarity, then attaches
//! best-effort enrichment (summaries, icebreakers). Missing vectors fail the
//! request; missing profiles only blank out the enrichment.
//! ============================================================================

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::enrichment::{AbsenceReason, Enricher, Enrichment};
use crate::store::{keys, Artifacts};
use crate::types::{sanitize_id, BondError, Profile, Result, Vector};

/// Cosine similarity of two equal-length vectors.
///
/// Accumulates in f64. If either vector has zero norm the result is `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(BondError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Result of comparing two profiles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    pub similarity: f64,
    /// Keyed by sanitized id; one entry when both ids are the same
    pub summaries: BTreeMap<String, Enrichment<String>>,
    pub icebreakers: Enrichment<Vec<String>>,
}

pub struct SimilarityService {
    artifacts: Artifacts,
    enricher: Enricher,
}

impl SimilarityService {
    pub fn new(artifacts: Artifacts, enricher: Enricher) -> Self {
        Self { artifacts, enricher }
    }

    pub async fn compare(&self, profile_a: &str, profile_b: &str) -> Result<SimilarityReport> {
        let a = sanitize_id(profile_a);
        let b = sanitize_id(profile_b);
        if a.is_empty() || b.is_empty() {
            return Err(BondError::InvalidInput(
                "profileA and profileB are required".to_string(),
            ));
        }

        let vector_a = self.load_vector(&a).await?;
        let vector_b = self.load_vector(&b).await?;
        let similarity = cosine_similarity(&vector_a, &vector_b)?;
        info!("Similarity {} vs {}: {:.4}", a, b, similarity);

        let loaded_a = self.load_profile(&a).await;
        let loaded_b = self.load_profile(&b).await;

        let mut summaries = BTreeMap::new();
        summaries.insert(a.clone(), self.summarize(&loaded_a).await);
        if b != a {
            summaries.insert(b.clone(), self.summarize(&loaded_b).await);
        }

        let icebreakers = match (&loaded_a, &loaded_b) {
            (Ok(pa), Ok(pb)) => self.enricher.icebreakers(pa, pb).await,
            _ => Enrichment::Absent(AbsenceReason::ProfilesIncomplete),
        };

        Ok(SimilarityReport {
            similarity,
            summaries,
            icebreakers,
        })
    }

    async fn load_vector(&self, id: &str) -> Result<Vector> {
        let key = keys::vector(id);
        info!("Loading vector: s3://{}/{}", self.artifacts.bucket(), key);
        self.artifacts.read_json(&key).await
    }

    async fn load_profile(&self, id: &str) -> std::result::Result<Profile, AbsenceReason> {
        let key = keys::profile(id);
        match self.artifacts.read_json::<Profile>(&key).await {
            Ok(profile) => Ok(profile),
            Err(BondError::NotFound(_)) => Err(AbsenceReason::ProfileMissing),
            Err(e) => {
                warn!("Profile {} unreadable: {}", key, e);
                Err(AbsenceReason::ProfileUnreadable(e.to_string()))
            }
        }
    }

    async fn summarize(&self, loaded: &std::result::Result<Profile, AbsenceReason>) -> Enrichment<String> {
        match loaded {
            Ok(profile) => self.enricher.summarize(profile).await,
            Err(reason) => Enrichment::Absent(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, Prompt, TextGenerator};
    use crate::store::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &Prompt) -> Result<Completion> {
            if prompt.user.starts_with("Profile A:") {
                Ok(Completion::from_text("1. Chess?\n2. Hiking?"))
            } else {
                Ok(Completion::from_text("Chess fan"))
            }
        }
    }

    fn service(store: &Artifacts) -> SimilarityService {
        SimilarityService::new(store.clone(), Enricher::new(Arc::new(EchoGenerator)))
    }

    fn store() -> Artifacts {
        Artifacts::new(Arc::new(MemoryBackend::new()), "bucket")
    }

    #[test]
    fn test_cosine_properties() {
        let a = [0.3f32, -1.2, 4.0];
        let b = [2.0f32, 0.5, -0.7];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);

        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &a).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        assert_eq!(
            cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(BondError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let err = service(&store()).compare("  ", "bob").await.unwrap_err();
        assert_eq!(err, BondError::InvalidInput("profileA and profileB are required".into()));
    }

    #[tokio::test]
    async fn test_ids_are_sanitized() {
        let store = store();
        store.write_json_compact(&keys::vector("alice"), &vec![1.0f32, 0.0]).await.unwrap();
        store.write_json_compact(&keys::vector("bob"), &vec![1.0f32, 1.0]).await.unwrap();

        let report = service(&store).compare(" Alice ", "BOB").await.unwrap();
        assert!((report.similarity - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(
            report.summaries.keys().cloned().collect::<Vec<_>>(),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(
            report.summaries["alice"],
            Enrichment::Absent(AbsenceReason::ProfileMissing)
        );
        assert_eq!(
            report.icebreakers,
            Enrichment::Absent(AbsenceReason::ProfilesIncomplete)
        );
    }

    #[tokio::test]
    async fn test_full_enrichment() {
        let store = store();
        for id in ["alice", "bob"] {
            store.write_json_compact(&keys::vector(id), &vec![0.5f32, 0.5]).await.unwrap();
            store.write_json(&keys::profile(id), &Profile::default()).await.unwrap();
        }

        let report = service(&store).compare("alice", "bob").await.unwrap();
        assert!((report.similarity - 1.0).abs() < 1e-6);
        assert_eq!(report.summaries["bob"], Enrichment::Present("Chess fan".into()));
        assert_eq!(
            report.icebreakers,
            Enrichment::Present(vec!["1. Chess?".to_string(), "2. Hiking?".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unreadable_profile_degrades() {
        let store = store();
        store.write_json_compact(&keys::vector("alice"), &vec![1.0f32]).await.unwrap();
        store.write_text(&keys::profile("alice"), "not json").await.unwrap();

        let report = service(&store).compare("alice", "alice").await.unwrap();
        assert_eq!(report.summaries.len(), 1);
        assert!(matches!(
            report.summaries["alice"].absence(),
            Some(AbsenceReason::ProfileUnreadable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_vector_is_not_found() {
        let store = store();
        store.write_json_compact(&keys::vector("alice"), &vec![1.0f32]).await.unwrap();
        let err = service(&store).compare("alice", "zed").await.unwrap_err();
        assert_eq!(err, BondError::NotFound("profiles/zed/vector.json".into()));
    }

    #[tokio::test]
    async fn test_mismatched_vectors_fail() {
        let store = store();
        store.write_json_compact(&keys::vector("alice"), &vec![1.0f32]).await.unwrap();
        store.write_json_compact(&keys::vector("bob"), &vec![1.0f32, 0.0]).await.unwrap();
        let err = service(&store).compare("alice", "bob").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
