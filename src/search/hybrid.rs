use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Chunk;
use crate::search::bm25::Bm25Hit;
use crate::search::vector::VectorHit;

/// A deduplicated candidate after fusing semantic and lexical results.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub chunk: Chunk,
    pub fused_score: f32,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
}

impl FusedCandidate {
    /// Found by both retrieval signals.
    pub fn matched_both(&self) -> bool {
        self.semantic_score.is_some() && self.lexical_score.is_some()
    }
}

/// Reciprocal Rank Fusion keyed by chunk identity.
///
/// Each list contributes `1 / (k + rank + 1)` per chunk; a chunk present in
/// both lists is kept once with the sum. Equal scores keep first-seen order
/// (semantic list first, then lexical), so the output is deterministic.
/// At most `limit` candidates are returned.
pub fn rrf_fusion(
    semantic_hits: Vec<VectorHit>,
    lexical_hits: Vec<Bm25Hit>,
    k: f32,
    limit: usize,
) -> Vec<FusedCandidate> {
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut fused: Vec<FusedCandidate> = Vec::new();

    for (rank, hit) in semantic_hits.into_iter().enumerate() {
        let rrf_score = 1.0 / (k + rank as f32 + 1.0);
        let candidate = entry(&mut positions, &mut fused, hit.chunk);
        let best = candidate.semantic_score.map_or(hit.score, |s| s.max(hit.score));
        candidate.semantic_score = Some(best);
        candidate.fused_score += rrf_score;
    }

    for (rank, hit) in lexical_hits.into_iter().enumerate() {
        let rrf_score = 1.0 / (k + rank as f32 + 1.0);
        let candidate = entry(&mut positions, &mut fused, hit.chunk);
        let best = candidate.lexical_score.map_or(hit.score, |s| s.max(hit.score));
        candidate.lexical_score = Some(best);
        candidate.fused_score += rrf_score;
    }

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(limit);
    fused
}

fn entry<'a>(
    positions: &mut HashMap<Uuid, usize>,
    fused: &'a mut Vec<FusedCandidate>,
    chunk: Chunk,
) -> &'a mut FusedCandidate {
    let idx = *positions.entry(chunk.id).or_insert_with(|| {
        fused.push(FusedCandidate {
            chunk,
            fused_score: 0.0,
            semantic_score: None,
            lexical_score: None,
        });
        fused.len() - 1
    });
    &mut fused[idx]
}
