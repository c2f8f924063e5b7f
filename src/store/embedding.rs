//! Deterministic local text embeddings for similarity search.
//!
//! Hashed bag-of-words: each lowercase alphanumeric token is hashed into
//! one of [`EMBEDDING_DIM`] buckets, term frequencies are accumulated, and
//! the vector is L2-normalized. No model weights, no network, and the same
//! text always embeds to the same vector, which keeps similarity search
//! reproducible across processes and test runs.

use sha2::{Digest, Sha256};

/// Number of hash buckets in an embedding vector.
pub const EMBEDDING_DIM: usize = 256;

/// Embed a text into a normalized term-frequency vector.
///
/// Empty or non-alphanumeric text embeds to the zero vector, which has
/// similarity 0.0 against everything.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in tokenize(text) {
        vector[bucket(&token)] += 1.0;
    }
    normalize(&mut vector);
    vector
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm
/// or the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Serialize a vector as little-endian f32 bytes for BLOB storage.
pub fn to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize a little-endian f32 BLOB back into a vector.
/// Trailing bytes that do not form a full f32 are ignored.
pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn bucket(token: &str) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head as usize % EMBEDDING_DIM
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_is_deterministic() {
        let a = embed("The quick brown fox jumps over the lazy dog");
        let b = embed("The quick brown fox jumps over the lazy dog");
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_has_fixed_dimension() {
        assert_eq!(embed("short").len(), EMBEDDING_DIM);
        assert_eq!(embed("").len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_embed_is_normalized() {
        let v = embed("some reasonably varied text with several words");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let v = embed("");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &embed("anything")), 0.0);
    }

    #[test]
    fn test_identical_text_has_full_similarity() {
        let a = embed("chapter about rust memory safety");
        let b = embed("chapter about rust memory safety");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let a = embed("Hello, World!");
        let b = embed("hello world");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unrelated_text_scores_lower_than_identical() {
        let query = embed("ownership and borrowing in rust");
        let same = embed("ownership and borrowing in rust");
        let other = embed("recipes for sourdough bread baking at home");
        assert!(cosine_similarity(&query, &same) > cosine_similarity(&query, &other));
    }

    #[test]
    fn test_mismatched_dimensions_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let v = embed("roundtrip me through blob storage");
        let restored = from_bytes(&to_bytes(&v));
        assert_eq!(v, restored);
    }
}
