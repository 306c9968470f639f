//! Embedding vector <-> byte blob conversion (§3)
//!
//! `F32_BLOB(D)` columns store exactly `4*D` bytes of little-endian IEEE-754
//! floats; these helpers are the only place that layout is encoded.

/// Encode a vector as the little-endian byte blob libsql's `F32_BLOB` columns
/// expect. NaN and infinite components are coerced to `0.0` before encoding,
/// per the embedding invariant in §3.
pub fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        let sanitized = if value.is_finite() { value } else { 0.0 };
        bytes.extend_from_slice(&sanitized.to_le_bytes());
    }
    bytes
}

/// Decode a `F32_BLOB` byte sequence back into a vector of floats
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// True when every component is exactly zero; the zero vector means "no
/// useful embedding" and is excluded from similarity results.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|&v| v == 0.0)
}

/// Coerce a polymorphic numeric value (JSON number, numeric string, or
/// already-numeric) into an `f32`, used when parsing wire-facing vector
/// queries (§4.5).
pub fn coerce_component(value: &serde_json::Value) -> Option<f32> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|v| v as f32),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|v| v as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let v = vec![0.1f32, -2.5, 3.0];
        let bytes = embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        let back = bytes_to_embedding(&bytes);
        assert_eq!(back, v);
    }

    #[test]
    fn test_nan_and_inf_coerced_to_zero() {
        let v = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 1.0];
        let bytes = embedding_to_bytes(&v);
        let back = bytes_to_embedding(&bytes);
        assert_eq!(back, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_is_zero_vector() {
        assert!(is_zero_vector(&[0.0, 0.0, 0.0]));
        assert!(!is_zero_vector(&[0.0, 0.1, 0.0]));
        assert!(is_zero_vector(&[]));
    }

    #[test]
    fn test_coerce_component() {
        assert_eq!(coerce_component(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(coerce_component(&serde_json::json!("2.5")), Some(2.5));
        assert_eq!(coerce_component(&serde_json::json!("nope")), None);
        assert_eq!(coerce_component(&serde_json::json!(null)), None);
    }
}
