//! One-way credential codec.
//!
//! Secrets are stretched with PBKDF2-HMAC-SHA256 under a per-record random
//! salt. The stored form is a single ASCII string:
//!
//! ```text
//! $pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>
//! ```
//!
//! The iteration count travels with the record, so raising the work factor
//! only affects new records; existing ones keep verifying under the count
//! they were created with.

use std::fmt;

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// Scheme tag written at the front of every record.
const SCHEME: &str = "pbkdf2-sha256";

/// Salt byte length.
const SALT_LEN: usize = 16;

/// Derived key byte length.
const HASH_LEN: usize = 32;

/// Lowest iteration count accepted for new or stored records.
pub const MIN_WORK_FACTOR: u32 = 1_000;

/// Highest iteration count honoured when reading a stored record.
pub const MAX_WORK_FACTOR: u32 = 10_000_000;

/// Iteration count used when nothing else is configured.
pub const DEFAULT_WORK_FACTOR: u32 = 600_000;

/// Longest secret, in bytes, the codec will hash.
pub const MAX_SECRET_LEN: usize = 1024;

/// Failures from [`CredentialRecord::hash`].
///
/// None of the variants carry the secret itself.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("secret cannot be empty")]
    EmptySecret,

    #[error("secret exceeds maximum length of {max} bytes")]
    SecretTooLong { max: usize },

    #[error("work factor {got} is below the minimum of {min}")]
    WorkFactorTooLow { got: u32, min: u32 },

    #[error("work factor {got} is above the maximum of {max}")]
    WorkFactorTooHigh { got: u32, max: u32 },

    #[error("failed to gather salt randomness: {0}")]
    Randomness(String),
}

/// Stored representation of a secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord(String);

impl CredentialRecord {
    /// Hash `secret` with `work_factor` PBKDF2 iterations and a fresh salt.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::EmptySecret`] / [`CredentialError::SecretTooLong`]
    ///   for secrets outside `1..=MAX_SECRET_LEN` bytes
    /// - [`CredentialError::WorkFactorTooLow`] / [`CredentialError::WorkFactorTooHigh`]
    /// - [`CredentialError::Randomness`] if the OS RNG is unavailable
    pub fn hash(secret: &[u8], work_factor: u32) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        if secret.len() > MAX_SECRET_LEN {
            return Err(CredentialError::SecretTooLong {
                max: MAX_SECRET_LEN,
            });
        }
        check_work_factor(work_factor)?;

        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CredentialError::Randomness(e.to_string()))?;

        let hash = derive(secret, &salt, work_factor);
        Ok(Self(encode(work_factor, &salt, &hash)))
    }

    /// Check `secret` against this record.
    ///
    /// The claimed secret is run through the same derivation and the two
    /// derived keys are compared without early exit. A malformed record
    /// yields `false`.
    pub fn verify(&self, secret: &[u8]) -> bool {
        let Some(parts) = self.parse() else {
            return false;
        };
        if secret.is_empty() || secret.len() > MAX_SECRET_LEN {
            return false;
        }

        let candidate = derive(secret, &parts.salt, parts.work_factor);
        constant_time_eq(&candidate, &parts.hash)
    }

    /// Wrap a value read back from storage. No validation happens here;
    /// a malformed value simply never verifies.
    pub fn from_stored(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// A well-formed record that no secret matches.
    ///
    /// Verifying against it costs the same as verifying against a real
    /// record with the same work factor, which keeps unknown-account
    /// logins indistinguishable by timing.
    ///
    /// Only records at that work factor are covered. Accounts whose records
    /// were hashed under an older factor verify at their own cost, so after
    /// the factor changes their timing differs from unknown accounts until
    /// they are rehashed.
    pub fn dummy(work_factor: u32) -> Self {
        let work_factor = work_factor.clamp(MIN_WORK_FACTOR, MAX_WORK_FACTOR);
        Self(encode(work_factor, &[0u8; SALT_LEN], &[0u8; HASH_LEN]))
    }

    /// Iteration count embedded in the record, if it parses.
    pub fn work_factor(&self) -> Option<u32> {
        self.parse().map(|p| p.work_factor)
    }

    /// Encoded form for storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the encoded form.
    pub fn into_string(self) -> String {
        self.0
    }

    fn parse(&self) -> Option<Parts> {
        let mut fields = self.0.strip_prefix('$')?.split('$');
        if fields.next()? != SCHEME {
            return None;
        }
        let work_factor: u32 = fields.next()?.parse().ok()?;
        let salt = hex::decode(fields.next()?).ok()?;
        let hash = hex::decode(fields.next()?).ok()?;
        if fields.next().is_some() {
            return None;
        }
        if check_work_factor(work_factor).is_err() || salt.len() != SALT_LEN || hash.len() != HASH_LEN
        {
            return None;
        }
        Some(Parts {
            work_factor,
            salt,
            hash,
        })
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("work_factor", &self.work_factor())
            .finish_non_exhaustive()
    }
}

struct Parts {
    work_factor: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

fn check_work_factor(work_factor: u32) -> Result<(), CredentialError> {
    if work_factor < MIN_WORK_FACTOR {
        return Err(CredentialError::WorkFactorTooLow {
            got: work_factor,
            min: MIN_WORK_FACTOR,
        });
    }
    if work_factor > MAX_WORK_FACTOR {
        return Err(CredentialError::WorkFactorTooHigh {
            got: work_factor,
            max: MAX_WORK_FACTOR,
        });
    }
    Ok(())
}

fn derive(secret: &[u8], salt: &[u8], work_factor: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(secret, salt, work_factor, &mut out);
    out
}

fn encode(work_factor: u32, salt: &[u8], hash: &[u8]) -> String {
    format!(
        "${SCHEME}${work_factor}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
