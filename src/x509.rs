//! Thin facade over a DER encoded X.509 certificate.
//!
//! Signature checks and key handling go through `openssl`, extension lookup through
//! `x509-parser`. Verification here is purely cryptographic: validity dates, name
//! chaining, key usage and revocation are never looked at.

use eyre::WrapErr;
use openssl::{
    bn::BigNumContext,
    ec::PointConversionForm,
    pkey::{PKey, PKeyRef, Public},
    x509::X509,
};
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    x509: X509,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

impl Certificate {
    /// # Errors
    /// Returns an error if `der` is not a single DER encoded certificate.
    pub fn from_der(der: &[u8]) -> eyre::Result<Self> {
        // openssl accepts trailing garbage after the certificate, x509-parser reports it
        let (rest, _) = X509Certificate::from_der(der)
            .map_err(|e| eyre::eyre!("error parsing certificate: {e}"))?;
        if !rest.is_empty() {
            eyre::bail!("{} trailing bytes after certificate", rest.len());
        }

        let x509 = X509::from_der(der).wrap_err("error loading certificate into openssl")?;

        Ok(Self {
            der: der.to_vec(),
            x509,
        })
    }

    /// # Errors
    /// Returns an error if `pem` does not hold a PEM encoded certificate.
    pub fn from_pem(pem: &str) -> eyre::Result<Self> {
        let x509 = X509::from_pem(pem.as_bytes()).wrap_err("error parsing PEM certificate")?;
        let der = x509.to_der()?;
        Self::from_der(&der)
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// # Errors
    /// Returns an error if the certificate carries a key openssl cannot load.
    pub fn public_key(&self) -> eyre::Result<PKey<Public>> {
        Ok(self.x509.public_key()?)
    }

    /// `SubjectPublicKeyInfo` as DER.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be loaded or encoded.
    pub fn public_key_raw(&self) -> eyre::Result<Vec<u8>> {
        Ok(self.public_key()?.public_key_to_der()?)
    }

    /// `SubjectPublicKeyInfo` as a `-----BEGIN PUBLIC KEY-----` block.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be loaded or encoded.
    pub fn public_key_pem(&self) -> eyre::Result<String> {
        let pem = self.public_key()?.public_key_to_pem()?;
        Ok(String::from_utf8(pem)?)
    }

    /// The subject EC point as `0x04 ‖ x ‖ y`, or `None` for non-EC keys.
    #[must_use]
    pub fn uncompressed_ec_point(&self) -> Option<Vec<u8>> {
        let ec_key = self.public_key().ok()?.ec_key().ok()?;
        let mut ctx = BigNumContext::new().ok()?;
        ec_key
            .public_key()
            .to_bytes(ec_key.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
            .ok()
    }

    /// Value of the extension identified by the dotted `oid`, if present.
    #[must_use]
    pub fn get_extension(&self, oid: &str) -> Option<Vec<u8>> {
        let (_, cert) = X509Certificate::from_der(&self.der).ok()?;
        cert.extensions()
            .iter()
            .find(|extension| extension.oid.to_id_string() == oid)
            .map(|extension| extension.value.to_vec())
    }

    /// Whether this certificate's signature was produced by the holder of `issuer_key`.
    #[must_use]
    pub fn verify(&self, issuer_key: &PKeyRef<Public>) -> bool {
        self.x509.verify(issuer_key).unwrap_or(false)
    }
}
