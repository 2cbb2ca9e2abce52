//! Reciprocal Rank Fusion (RRF) of the vector and lexical rankings.
//!
//! `score(d) = sum over lists of 1 / (k + rank(d))`, ranks 1-based. Only rank
//! positions matter, so the two lists' raw scores never need to be comparable.

use std::collections::{HashMap, HashSet};

use signaldb_core::types::{DocId, SearchHit};

/// Damping constant from Cormack, Clarke and Buettcher (SIGIR 2009).
pub const RRF_K: u32 = 60;

/// Fused `(id, score)` pairs, best first.
///
/// Within a list only an id's first occurrence counts. Equal scores keep the
/// order in which ids were first seen, scanning the vector list first.
pub fn reciprocal_rank_fusion(vector: &[SearchHit], lexical: &[SearchHit], k: u32) -> Vec<(DocId, f64)> {
    let k = f64::from(k);
    let mut order: Vec<DocId> = Vec::new();
    let mut scores: HashMap<DocId, f64> = HashMap::new();

    for list in [vector, lexical] {
        let mut seen_in_list: HashSet<&str> = HashSet::with_capacity(list.len());
        for (pos, hit) in list.iter().enumerate() {
            if !seen_in_list.insert(hit.id.as_str()) {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (k + (pos + 1) as f64);
            match scores.get_mut(&hit.id) {
                Some(s) => *s += contribution,
                None => {
                    order.push(hit.id.clone());
                    scores.insert(hit.id.clone(), contribution);
                }
            }
        }
    }

    let mut fused: Vec<(DocId, f64)> = order
        .into_iter()
        .map(|id| {
            let s = scores.get(&id).copied().unwrap_or_default();
            (id, s)
        })
        .collect();
    // sort_by is stable, so ties stay in first-seen order
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

/// Fused ids, best first.
pub fn fuse(vector: &[SearchHit], lexical: &[SearchHit], k: u32) -> Vec<DocId> {
    reciprocal_rank_fusion(vector, lexical, k).into_iter().map(|(id, _)| id).collect()
}
