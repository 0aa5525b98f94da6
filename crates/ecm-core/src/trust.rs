//! Signer allowlists.
//!
//! The registry is built once from system configuration when the service
//! starts and never changes afterwards. It maps package names to the
//! SHA-256 digests of the signing certificates that make a package with that
//! name trusted.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::platform::{PackageManager, UserId};

/// Size of a certificate digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Errors produced when parsing a certificate digest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    /// Not valid hexadecimal.
    #[error("certificate digest is not valid hex: {0}")]
    InvalidHex(String),

    /// Wrong number of bytes.
    #[error("certificate digest must be {DIGEST_SIZE} bytes, got {0}")]
    InvalidLength(usize),
}

/// SHA-256 digest of a signing certificate.
#[derive(Clone, Copy, Eq)]
pub struct CertificateDigest([u8; DIGEST_SIZE]);

impl CertificateDigest {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Digest of a DER-encoded certificate.
    #[must_use]
    pub fn of_certificate(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for CertificateDigest {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Hash for CertificateDigest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for CertificateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateDigest({})", self.to_hex())
    }
}

impl fmt::Display for CertificateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for CertificateDigest {
    type Err = DigestParseError;

    /// Parses hex, tolerating the colon-separated form `AB:CD:...` printed
    /// by `apksigner` and `keytool`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.trim().chars().filter(|c| *c != ':').collect();
        let bytes = hex::decode(&compact).map_err(|e| DigestParseError::InvalidHex(e.to_string()))?;
        let len = bytes.len();
        let array: [u8; DIGEST_SIZE] = bytes
            .try_into()
            .map_err(|_| DigestParseError::InvalidLength(len))?;
        Ok(Self(array))
    }
}

impl Serialize for CertificateDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CertificateDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A package name bound to one signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedPackage {
    /// Package name.
    pub package_name: String,
    /// Digest of the certificate the package must be signed with.
    pub certificate_digest: CertificateDigest,
}

/// Immutable signer allowlists for trusted packages and trusted installers.
#[derive(Debug, Clone, Default)]
pub struct TrustRegistry {
    trusted_packages: HashMap<String, Vec<CertificateDigest>>,
    trusted_installers: HashMap<String, Vec<CertificateDigest>>,
}

impl TrustRegistry {
    /// Builds the registry from configured signer lists.
    #[must_use]
    pub fn new(trusted_packages: &[SignedPackage], trusted_installers: &[SignedPackage]) -> Self {
        Self {
            trusted_packages: index(trusted_packages),
            trusted_installers: index(trusted_installers),
        }
    }

    /// Number of distinct trusted package names.
    #[must_use]
    pub fn trusted_package_count(&self) -> usize {
        self.trusted_packages.len()
    }

    /// Number of distinct trusted installer names.
    #[must_use]
    pub fn trusted_installer_count(&self) -> usize {
        self.trusted_installers.len()
    }

    /// Whether `package` is explicitly trusted and signed accordingly.
    pub fn is_allowlisted_package(
        &self,
        packages: &dyn PackageManager,
        package: &str,
        user: UserId,
    ) -> bool {
        signed_with_any(&self.trusted_packages, packages, package, user)
    }

    /// Whether `package` is a trusted installer and signed accordingly.
    pub fn is_allowlisted_installer(
        &self,
        packages: &dyn PackageManager,
        package: &str,
        user: UserId,
    ) -> bool {
        signed_with_any(&self.trusted_installers, packages, package, user)
    }
}

fn index(entries: &[SignedPackage]) -> HashMap<String, Vec<CertificateDigest>> {
    let mut map: HashMap<String, Vec<CertificateDigest>> = HashMap::new();
    for entry in entries {
        let digests = map.entry(entry.package_name.clone()).or_default();
        if !digests.contains(&entry.certificate_digest) {
            digests.push(entry.certificate_digest);
        }
    }
    map
}

fn signed_with_any(
    allowlist: &HashMap<String, Vec<CertificateDigest>>,
    packages: &dyn PackageManager,
    package: &str,
    user: UserId,
) -> bool {
    allowlist.get(package).is_some_and(|digests| {
        digests
            .iter()
            .any(|digest| packages.has_signing_certificate(package, user, digest))
    })
}
