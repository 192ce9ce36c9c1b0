use ciborium::Value;

/// Deepest container nesting accepted from a client blob.
pub const MAX_DEPTH: usize = 5;

/// Decodes exactly one CBOR value from `bytes`.
///
/// Fails on malformed or truncated input, on nesting deeper than [`MAX_DEPTH`] and
/// when any bytes are left over after the first value.
///
/// # Errors
/// Returns an error describing why `bytes` is not a single well-formed CBOR value.
pub fn decode_first(bytes: &[u8]) -> eyre::Result<Value> {
    let mut reader = bytes;
    let value: Value = ciborium::de::from_reader_with_recursion_limit(&mut reader, MAX_DEPTH)
        .map_err(|e| eyre::eyre!("error decoding cbor value: {e}"))?;

    if !reader.is_empty() {
        eyre::bail!("{} trailing bytes after cbor value", reader.len());
    }

    Ok(value)
}

/// Looks up a text key in a decoded CBOR map.
pub(crate) fn map_get<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}
