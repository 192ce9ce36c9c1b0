use base64::{engine::general_purpose, Engine as _};
use openssl::sha::Sha256;
use serde::{Deserialize, Serialize};

/// Identifies the app an attestation or assertion was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    /// `<10-char team id>.<bundle id>`
    pub app_id: String,
    /// Selects the `appattestdevelop` AAGUID instead of the production one.
    pub development_env: bool,
}

impl AppInfo {
    #[must_use]
    pub fn new(app_id: impl Into<String>, development_env: bool) -> Self {
        Self {
            app_id: app_id.into(),
            development_env,
        }
    }
}

/// SHA-256 over the concatenation of `parts`.
#[must_use]
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finish()
}

#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// # Errors
/// Returns an error if `input` is not standard (padded) base64.
pub fn decode_base64(input: &str) -> eyre::Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(input.trim())?)
}

/// Parses a hyphenated UUID (e.g. a challenge handed out to the client) into its 16 raw bytes.
///
/// # Errors
/// Returns an error if `uuid` is not a valid UUID string.
pub fn uuid_bytes(uuid: &str) -> eyre::Result<[u8; 16]> {
    Ok(*uuid::Uuid::parse_str(uuid)?.as_bytes())
}

/// Read-only view over Apple's authenticator data layout (big-endian).
///
/// | offset | length | field |
/// |---|---|---|
/// | 0 | 32 | `rp_id_hash` |
/// | 32 | 1 | flags |
/// | 33 | 4 | `sign_count` |
/// | 37 | 16 | `aaguid` (attestation only) |
/// | 53 | 2 | `credential_id_len` (attestation only) |
/// | 55 | 32 | `credential_id` (attestation only) |
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatorData<'a>(&'a [u8]);

impl<'a> AuthenticatorData<'a> {
    const RP_ID_HASH: std::ops::Range<usize> = 0..32;
    const FLAGS: usize = 32;
    const SIGN_COUNT: std::ops::Range<usize> = 33..37;
    const AAGUID: std::ops::Range<usize> = 37..53;
    const CREDENTIAL_ID_LEN: std::ops::Range<usize> = 53..55;
    const CREDENTIAL_ID: std::ops::Range<usize> = 55..87;

    /// Minimum length carried by an assertion: rp id hash, flags and counter.
    ///
    /// The counter sits at bytes 33..37, so 34 bytes (hash and flags plus one) are not enough
    /// to read it.
    pub const MIN_ASSERTION_LEN: usize = 37;
    /// Minimum length carried by an attestation.
    pub const MIN_ATTESTATION_LEN: usize = 88;

    /// Wraps `bytes` if they are long enough for the assertion fields.
    #[must_use]
    pub const fn for_assertion(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < Self::MIN_ASSERTION_LEN {
            return None;
        }
        Some(Self(bytes))
    }

    /// Wraps `bytes` already checked against [`Self::MIN_ASSERTION_LEN`].
    pub(crate) const fn assume_assertion(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= Self::MIN_ASSERTION_LEN);
        Self(bytes)
    }

    /// Wraps `bytes` if they are long enough for the attestation fields.
    #[must_use]
    pub const fn for_attestation(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < Self::MIN_ATTESTATION_LEN {
            return None;
        }
        Some(Self(bytes))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    #[must_use]
    pub fn rp_id_hash(&self) -> &'a [u8] {
        &self.0[Self::RP_ID_HASH]
    }

    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.0[Self::FLAGS]
    }

    #[must_use]
    pub fn sign_count(&self) -> u32 {
        let bytes = &self.0[Self::SIGN_COUNT];
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Only meaningful for attestations (guaranteed in range by `for_attestation`).
    #[must_use]
    pub fn aaguid(&self) -> &'a [u8] {
        &self.0[Self::AAGUID]
    }

    #[must_use]
    pub fn credential_id_len(&self) -> u16 {
        let bytes = &self.0[Self::CREDENTIAL_ID_LEN];
        u16::from_be_bytes([bytes[0], bytes[1]])
    }

    #[must_use]
    pub fn credential_id(&self) -> &'a [u8] {
        &self.0[Self::CREDENTIAL_ID]
    }

    /// Whether the rp id hash is SHA-256 of `app_id`.
    #[must_use]
    pub fn matches_app_id(&self, app_id: &str) -> bool {
        self.rp_id_hash() == sha256(&[app_id.as_bytes()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_concatenates_parts() {
        assert_eq!(sha256(&[b"ab", b"c"]), sha256(&[b"abc"]));
        assert_eq!(
            hex::encode(sha256(&[b"abc"])),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_uuid_bytes() {
        let bytes = uuid_bytes("279e8603-7bb9-4c7a-8965-aa1f8d7c16ee").unwrap();
        assert_eq!(hex::encode(bytes), "279e86037bb94c7a8965aa1f8d7c16ee");

        assert!(uuid_bytes("not-a-uuid").is_err());
    }

    #[test]
    fn test_base64_round_trip() {
        let encoded = encode_base64(&[0xfb, 0xb3, 0x56]);
        assert_eq!(encoded, "+7NW");
        assert_eq!(decode_base64(&encoded).unwrap(), vec![0xfb, 0xb3, 0x56]);
        assert!(decode_base64("random_key_id").is_err());
    }

    #[test]
    fn test_authenticator_data_offsets() {
        let mut bytes = vec![0u8; 88];
        bytes[..32].copy_from_slice(&sha256(&[b"TEAMID1234.com.example"]));
        bytes[32] = 0x40;
        bytes[33..37].copy_from_slice(&[0x00, 0x00, 0x01, 0x02]);
        bytes[37..53].copy_from_slice(b"appattestdevelop");
        bytes[53..55].copy_from_slice(&[0x00, 0x20]);
        bytes[55..87].fill(0xab);

        let auth_data = AuthenticatorData::for_attestation(&bytes).unwrap();
        assert!(auth_data.matches_app_id("TEAMID1234.com.example"));
        assert!(!auth_data.matches_app_id("TEAMID1234.com.other"));
        assert_eq!(auth_data.flags(), 0x40);
        assert_eq!(auth_data.sign_count(), 258);
        assert_eq!(auth_data.aaguid(), b"appattestdevelop");
        assert_eq!(auth_data.credential_id_len(), 32);
        assert_eq!(auth_data.credential_id(), &[0xab; 32]);
    }

    #[test]
    fn test_authenticator_data_minimum_lengths() {
        assert!(AuthenticatorData::for_attestation(&[0u8; 87]).is_none());
        assert!(AuthenticatorData::for_attestation(&[0u8; 88]).is_some());
        assert!(AuthenticatorData::for_assertion(&[0u8; 33]).is_none());
        assert!(AuthenticatorData::for_assertion(&[0u8; 36]).is_none());
        assert!(AuthenticatorData::for_assertion(&[0u8; 37]).is_some());
    }
}
