// SPDX-FileCopyrightText: 2026 vecmem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brute-force ranking shared by the in-process backends.

use vecmem_core::types::sort_by_similarity;
use vecmem_core::{Metadata, Metric, SearchOptions, SearchResult};

/// Score every candidate, apply the filter and threshold, keep the best `k`.
pub(crate) fn rank<'a, I>(
    query: &[f32],
    candidates: I,
    metric: Metric,
    k: usize,
    options: &SearchOptions,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = (&'a str, &'a [f32], Option<&'a Metadata>)>,
{
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|(_, _, metadata)| options.matches(*metadata))
        .filter_map(|(id, embedding, metadata)| {
            let distance = metric.distance(query, embedding);
            let similarity = metric.similarity(distance);
            options.accepts(similarity).then(|| SearchResult {
                id: id.to_string(),
                distance,
                similarity,
                metadata: metadata.cloned(),
            })
        })
        .collect();

    sort_by_similarity(&mut results);
    results.truncate(k);
    results
}

/// Encode an embedding as a little-endian f32 BLOB.
pub(crate) fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 BLOB. Trailing partial words are ignored.
pub(crate) fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
