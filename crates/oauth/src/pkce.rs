use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::{TryRngCore, rngs::OsRng},
    sha2::{Digest, Sha256},
};

use crate::{Error, Result, types::PkceChallenge};

/// Bytes of OS randomness behind each verifier (256 bits, 43 base64url chars).
const VERIFIER_BYTES: usize = 32;

/// Generate a PKCE verifier and its S256 challenge.
pub fn generate_pkce() -> Result<PkceChallenge> {
    let verifier = random_url_safe(VERIFIER_BYTES)?;
    let challenge = s256_challenge(&verifier);
    Ok(PkceChallenge {
        verifier,
        challenge,
    })
}

/// Random opaque `state` value echoed back by the provider on the callback.
pub fn generate_state() -> Result<String> {
    random_url_safe(16)
}

/// `base64url_nopad(SHA-256(verifier))`.
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_url_safe(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::PkceGenerationFailed {
            reason: e.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
