//! Query facade (C8): persona-filtered, brute-force cosine-distance
//! nearest-neighbor search over a collection's stored records.
//!
//! There is no ANN index here — the store is a single JSON blob per
//! collection (see [`crate::storage::RecordStore`]), so a query scores
//! every record and keeps the top k. That is the right trade for the
//! dataset sizes this pipeline targets; a persona filter narrows the
//! candidate set before scoring rather than after, so a restrictive
//! persona also makes queries cheaper.

use crate::embedding::CachedEmbeddingProvider;
use crate::model::{FlatValue, KnowledgeTier, StoreRecord};
use crate::storage::RecordStore;
use crate::PipelineError;
use std::cmp::Ordering;
use std::sync::Arc;

/// A named access profile. Every field is closed (no free-form rules):
/// a query either falls inside every stated bound or the record is
/// dropped before scoring.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub max_knowledge_tier: KnowledgeTier,
    pub allowed_info_sources: Option<Vec<String>>,
    pub allowed_locations: Option<Vec<String>>,
    pub allowed_regions: Option<Vec<String>>,
    pub content_type_whitelist: Option<Vec<String>>,
    pub max_year: Option<i32>,
}

impl Persona {
    /// The unrestricted persona: every tier, source, location, region,
    /// content type, and year.
    pub fn unrestricted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_knowledge_tier: KnowledgeTier::Restricted,
            allowed_info_sources: None,
            allowed_locations: None,
            allowed_regions: None,
            content_type_whitelist: None,
            max_year: None,
        }
    }

    /// Whether `record` is visible to this persona. Missing metadata
    /// fields fail open on bounds that describe a value a chunk may
    /// legitimately lack (`max_year`, `allowed_locations`,
    /// `allowed_regions` — a chunk with no detected location/region/year
    /// is never excluded by those bounds) but fail closed on tier/source/
    /// content type, since every record is enriched with those by
    /// construction.
    pub fn allows(&self, record: &StoreRecord) -> bool {
        if let Some(FlatValue::String(tier)) = record.metadata.get("knowledge_tier") {
            if let Some(tier) = KnowledgeTier::parse(tier) {
                if tier > self.max_knowledge_tier {
                    return false;
                }
            }
        }
        if let Some(allowed) = &self.allowed_info_sources {
            match record.metadata.get("info_source") {
                Some(FlatValue::String(source)) if allowed.iter().any(|a| a == source) => {}
                _ => return false,
            }
        }
        if let Some(allowed) = &self.content_type_whitelist {
            match record.metadata.get("content_type") {
                Some(FlatValue::String(ct)) if allowed.iter().any(|a| a == ct) => {}
                _ => return false,
            }
        }
        if let Some(allowed) = &self.allowed_locations {
            if let Some(FlatValue::String(location)) = record.metadata.get("location") {
                if !allowed.iter().any(|a| a == location) {
                    return false;
                }
            }
        }
        if let Some(allowed) = &self.allowed_regions {
            if let Some(FlatValue::String(region)) = record.metadata.get("region_type") {
                if !allowed.iter().any(|a| a == region) {
                    return false;
                }
            }
        }
        if let Some(max_year) = self.max_year {
            if let Some(FlatValue::Int(year_max)) = record.metadata.get("year_max") {
                if *year_max > max_year as i64 {
                    return false;
                }
            }
        }
        true
    }
}

/// One scored hit.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub id: String,
    pub document: String,
    pub distance: f32,
    pub metadata: std::collections::BTreeMap<String, FlatValue>,
}

pub struct QueryFacade {
    store: Arc<dyn RecordStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Embed `query_text`, load the collection, filter by `persona`, and
    /// return the `top_k` nearest records by cosine distance (ascending).
    /// Ties break by `chunk_index` then `id` so results are reproducible
    /// across runs against an unchanged collection.
    pub async fn search(
        &self,
        collection: &str,
        query_text: &str,
        persona: &Persona,
        top_k: usize,
        provider: &CachedEmbeddingProvider,
    ) -> Result<Vec<QueryResult>, PipelineError> {
        let query_vector = provider
            .embed(query_text)
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        let records = self.load_records(collection).await?;
        self.search_with_vector(&records, &query_vector, persona, top_k)
    }

    async fn load_records(&self, collection: &str) -> Result<Vec<StoreRecord>, PipelineError> {
        match self.store.load(collection).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(PipelineError::CollectionNotFound(collection.to_string())),
        }
    }

    fn search_with_vector(
        &self,
        records: &[StoreRecord],
        query_vector: &[f32],
        persona: &Persona,
        top_k: usize,
    ) -> Result<Vec<QueryResult>, PipelineError> {
        let mut scored: Vec<(f32, &StoreRecord)> = records
            .iter()
            .filter(|r| persona.allows(r))
            .map(|r| (cosine_distance(query_vector, &r.embedding), r))
            .collect();

        scored.sort_by(|(da, ra), (db, rb)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| chunk_index_of(ra).cmp(&chunk_index_of(rb)))
                .then_with(|| ra.id.cmp(&rb.id))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, r)| QueryResult {
                id: r.id.clone(),
                document: r.document.clone(),
                distance,
                metadata: r.metadata.clone(),
            })
            .collect())
    }
}

fn chunk_index_of(record: &StoreRecord) -> i64 {
    match record.metadata.get("chunk_index") {
        Some(FlatValue::Int(n)) => *n,
        _ => i64::MAX,
    }
}

/// `1 - cosine_similarity`, so 0 means identical direction. Zero vectors
/// (shouldn't occur for a real embedding, but the query path must not
/// panic on one) are treated as maximally distant from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return f32::MAX;
    }
    1.0 - (dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(id: &str, embedding: Vec<f32>, tier: &str, source: &str, chunk_index: i64) -> StoreRecord {
        let mut metadata = BTreeMap::new();
        metadata.insert("knowledge_tier".to_string(), FlatValue::String(tier.to_string()));
        metadata.insert("info_source".to_string(), FlatValue::String(source.to_string()));
        metadata.insert("chunk_index".to_string(), FlatValue::Int(chunk_index));
        StoreRecord {
            id: id.to_string(),
            document: format!("doc {}", id),
            embedding,
            metadata,
        }
    }

    #[test]
    fn cosine_distance_is_zero_for_identical_direction() {
        let d = cosine_distance(&[1.0, 0.0], &[2.0, 0.0]);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_is_two_for_opposite_direction() {
        let d = cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn persona_excludes_tier_above_max() {
        let persona = Persona {
            name: "public".to_string(),
            max_knowledge_tier: KnowledgeTier::Common,
            allowed_info_sources: None,
            allowed_locations: None,
            allowed_regions: None,
            content_type_whitelist: None,
            max_year: None,
        };
        let r = record("a", vec![1.0], "classified", "military", 0);
        assert!(!persona.allows(&r));
    }

    #[test]
    fn persona_allows_tier_at_or_below_max() {
        let persona = Persona {
            name: "public".to_string(),
            max_knowledge_tier: KnowledgeTier::Regional,
            allowed_info_sources: None,
            allowed_locations: None,
            allowed_regions: None,
            content_type_whitelist: None,
            max_year: None,
        };
        let r = record("a", vec![1.0], "regional".into(), "public", 0);
        assert!(persona.allows(&record("a", vec![1.0], "common", "public", 0)));
        assert!(persona.allows(&r));
    }

    #[test]
    fn persona_filters_by_allowed_info_source() {
        let persona = Persona {
            name: "military".to_string(),
            max_knowledge_tier: KnowledgeTier::Restricted,
            allowed_info_sources: Some(vec!["military".to_string()]),
            allowed_locations: None,
            allowed_regions: None,
            content_type_whitelist: None,
            max_year: None,
        };
        assert!(persona.allows(&record("a", vec![1.0], "common", "military", 0)));
        assert!(!persona.allows(&record("b", vec![1.0], "common", "corporate", 0)));
    }

    #[test]
    fn persona_filters_by_region_and_year_max() {
        let mut east = record("east", vec![1.0], "common", "vault-tec", 0);
        east.metadata
            .insert("region_type".to_string(), FlatValue::String("East Coast".to_string()));
        east.metadata.insert("year_max".to_string(), FlatValue::Int(2102));

        let mut west = record("west", vec![1.0], "common", "public", 1);
        west.metadata
            .insert("region_type".to_string(), FlatValue::String("West Coast".to_string()));
        west.metadata.insert("year_max".to_string(), FlatValue::Int(2287));

        let persona = Persona {
            name: "east-coast-scholar".to_string(),
            max_knowledge_tier: KnowledgeTier::Restricted,
            allowed_info_sources: Some(vec!["vault-tec".to_string(), "public".to_string()]),
            allowed_locations: None,
            allowed_regions: Some(vec!["East Coast".to_string()]),
            content_type_whitelist: None,
            max_year: Some(2102),
        };

        assert!(persona.allows(&east));
        assert!(!persona.allows(&west));
    }

    #[test]
    fn search_orders_by_distance_ascending() {
        let facade = QueryFacade::new(Arc::new(crate::storage::LocalRecordStore::new(".")));
        let records = vec![
            record("far", vec![0.0, 1.0], "common", "public", 0),
            record("near", vec![1.0, 0.0], "common", "public", 1),
        ];
        let persona = Persona::unrestricted("everyone");
        let results = facade
            .search_with_vector(&records, &[1.0, 0.0], &persona, 10)
            .unwrap();
        assert_eq!(results[0].id, "near");
        assert_eq!(results[1].id, "far");
    }

    #[test]
    fn search_breaks_ties_by_chunk_index_then_id() {
        let facade = QueryFacade::new(Arc::new(crate::storage::LocalRecordStore::new(".")));
        let records = vec![
            record("z", vec![1.0, 0.0], "common", "public", 2),
            record("a", vec![1.0, 0.0], "common", "public", 1),
        ];
        let persona = Persona::unrestricted("everyone");
        let results = facade
            .search_with_vector(&records, &[1.0, 0.0], &persona, 10)
            .unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "z");
    }

    #[test]
    fn search_respects_top_k() {
        let facade = QueryFacade::new(Arc::new(crate::storage::LocalRecordStore::new(".")));
        let records = vec![
            record("a", vec![1.0, 0.0], "common", "public", 0),
            record("b", vec![0.9, 0.1], "common", "public", 1),
            record("c", vec![0.0, 1.0], "common", "public", 2),
        ];
        let persona = Persona::unrestricted("everyone");
        let results = facade
            .search_with_vector(&records, &[1.0, 0.0], &persona, 2)
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
