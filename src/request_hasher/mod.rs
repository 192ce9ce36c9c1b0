use openssl::sha::Sha256;
use serde_json::Value;

/// Produces the `clientDataHash` an App Attest client signs for a request.
///
/// The request is serialized as compact JSON with object keys sorted recursively, then hashed
/// with SHA-256, so client and server agree on the digest regardless of key order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHasher;

impl RequestHasher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// SHA-256 of the canonical serialization of `request`.
    ///
    /// # Errors
    /// Returns an error if `request` cannot be serialized.
    pub fn client_data_hash(&self, request: &Value) -> Result<[u8; 32], eyre::Error> {
        let serialized = serde_json::to_string(&sort_json(request))?;

        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        Ok(hasher.finish())
    }

    /// Same as [`Self::client_data_hash`] for a raw JSON body.
    ///
    /// # Errors
    /// Returns an error if `body` is not valid JSON.
    pub fn client_data_hash_from_str(&self, body: &str) -> Result<[u8; 32], eyre::Error> {
        let request: Value = serde_json::from_str(body)?;
        self.client_data_hash(&request)
    }

    /// Hex encoded [`Self::client_data_hash`].
    ///
    /// # Errors
    /// Returns an error if `request` cannot be serialized.
    pub fn hex_digest(&self, request: &Value) -> Result<String, eyre::Error> {
        Ok(hex::encode(self.client_data_hash(request)?))
    }
}

// Helper function to recursively sort JSON objects by their keys
fn sort_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted_keys: Vec<_> = map.keys().collect();
            sorted_keys.sort();

            Value::Object(
                sorted_keys
                    .into_iter()
                    .map(|key| (key.clone(), sort_json(&map[key])))
                    .collect(),
            )
        }
        Value::Array(vec) => Value::Array(vec.iter().map(sort_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
pub mod test;
