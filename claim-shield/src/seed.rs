use tracing::info;

use crate::{embedding::EmbeddingProvider, error::Result, index::SimilarityIndex};

/// Known fraud patterns loaded into the index at startup.
pub const SEED_CASES: [&str; 5] = [
    "Intentional front-end collision for insurance payout in parking lot.",
    "Staged accident with pre-damaged parts swapped before inspection.",
    "Inflated repair costs with ghost parts in collaboration with local garage.",
    "Double dipping: claiming same damage on multiple insurance policies.",
    "Reported hit-and-run that was actually a collision with a fixed object.",
];

/// Embeds and inserts `cases` in order. Returns the number inserted.
pub async fn seed_index<I, S>(
    index: &dyn SimilarityIndex,
    embedder: &dyn EmbeddingProvider,
    cases: I,
) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut inserted = 0;
    for case in cases {
        let text = case.into();
        let embedding = embedder.embed(&text).await?;
        index.insert(text, embedding)?;
        inserted += 1;
    }
    info!(inserted, total = index.len(), "Seeded similarity index");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedding::HashingEmbedder, index::ExactIndex};

    #[tokio::test]
    async fn test_seed_corpus() {
        let embedder = HashingEmbedder::new(128);
        let index = ExactIndex::new(128).unwrap();

        let inserted = seed_index(&index, &embedder, SEED_CASES).await.unwrap();
        assert_eq!(inserted, 5);
        assert_eq!(index.len(), 5);

        let query = embedder.embed_sync(SEED_CASES[1]);
        let results = index.query(&query, 1).unwrap();
        assert_eq!(results[0].case_text, SEED_CASES[1]);
        assert_eq!(results[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_seed_rejects_mismatched_embedder() {
        let embedder = HashingEmbedder::new(16);
        let index = ExactIndex::new(32).unwrap();
        assert!(seed_index(&index, &embedder, SEED_CASES).await.is_err());
        assert!(index.is_empty());
    }
}
