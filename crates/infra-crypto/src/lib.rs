//! Age-based identity/recipient encryption for the secure config store.
//!
//! A single process-wide identity loaded from a keyfile provides both the
//! decryption capability and, via its derived recipient, the encryption
//! capability. `age`'s native STREAM construction over ChaCha20-Poly1305
//! binds header-level recipient stanzas to the ciphertext, satisfying the
//! "tampering is detectable" requirement without any extra MAC layer of
//! our own.

use ripcore_core::error::{AppError, CryptoError, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Conventional keyfile names probed in the working directory when no
/// `-agekey` flag is supplied.
pub const DEFAULT_KEYFILE_NAMES: &[&str] = &["age_key.txt", "age.key"];

/// Resolve the identity keyfile path: the explicit flag if given,
/// otherwise the first of `DEFAULT_KEYFILE_NAMES` that exists in `cwd`.
pub fn discover_keyfile(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    for name in DEFAULT_KEYFILE_NAMES {
        let candidate = cwd.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(AppError::Crypto(CryptoError::IdentityRead(format!(
        "no identity keyfile found in {} (looked for {:?})",
        cwd.display(),
        DEFAULT_KEYFILE_NAMES
    ))))
}

/// Load the process-wide identity from a keyfile. The file is line
/// oriented (the `age-keygen` format): blank lines and `#`-prefixed
/// comments are ignored; the first `AGE-SECRET-KEY-1...` line is parsed.
pub fn load_identity(path: &Path) -> Result<age::x25519::Identity> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Crypto(CryptoError::IdentityRead(format!("{}: {e}", path.display()))))?;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        return line
            .parse::<age::x25519::Identity>()
            .map_err(|e| AppError::Crypto(CryptoError::IdentityParse(e.to_string())));
    }

    Err(AppError::Crypto(CryptoError::IdentityParse(
        "keyfile contains no identity line".to_string(),
    )))
}

/// Generate a brand new identity and persist it to `path` (used by `ripc
/// app create` / tests, not part of the runtime decryption path). The
/// secret line is held as a `SecretString` between generation and the
/// single write so it never lingers in a plain `String` longer than
/// necessary.
pub fn generate_and_write_identity(path: &Path) -> Result<age::x25519::Identity> {
    use secrecy::ExposeSecret;

    let identity = age::x25519::Identity::generate();
    let secret_line = secrecy::SecretString::new(identity.to_string());
    let contents = format!(
        "# created by ripc\n# public key: {}\n{}\n",
        identity.to_public(),
        secret_line.expose_secret()
    );
    std::fs::write(path, contents)
        .map_err(|e| AppError::Crypto(CryptoError::IdentityRead(format!("{}: {e}", path.display()))))?;
    Ok(identity)
}

/// Encrypt `plaintext` for `recipient`. The recipient and format/
/// description metadata are stored in the clear by the caller; only
/// `plaintext` is protected here.
pub fn encrypt(recipient: &age::x25519::Recipient, plaintext: &[u8]) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient.clone())])
        .expect("a recipient was provided");

    let mut ciphertext = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut ciphertext)
        .map_err(|e| AppError::Crypto(CryptoError::EncryptionFailed(e.to_string())))?;
    writer
        .write_all(plaintext)
        .map_err(|e| AppError::Crypto(CryptoError::EncryptionFailed(e.to_string())))?;
    writer
        .finish()
        .map_err(|e| AppError::Crypto(CryptoError::EncryptionFailed(e.to_string())))?;

    Ok(ciphertext)
}

/// Decrypt `ciphertext` with `identity`. Any tampering with the header or
/// body surfaces as `CryptoError::DecryptionFailed`, never a silently
/// wrong plaintext (age's authenticated STREAM construction).
pub fn decrypt(identity: &age::x25519::Identity, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(ciphertext)
        .map_err(|_| AppError::Crypto(CryptoError::DecryptionFailed))?
    {
        age::Decryptor::Recipients(d) => d,
        age::Decryptor::Passphrase(_) => {
            return Err(AppError::Crypto(CryptoError::UnsupportedIdentity(
                "passphrase-encrypted content is not supported".to_string(),
            )))
        }
    };

    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|_| AppError::Crypto(CryptoError::DecryptionFailed))?;

    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|_| AppError::Crypto(CryptoError::DecryptionFailed))?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let identity = age::x25519::Identity::generate();
        let recipient = identity.to_public();

        let ciphertext = encrypt(&recipient, b"a=1").unwrap();
        let plaintext = decrypt(&identity, &ciphertext).unwrap();
        assert_eq!(plaintext, b"a=1");
    }

    #[test]
    fn decrypt_with_wrong_identity_fails() {
        let identity = age::x25519::Identity::generate();
        let other = age::x25519::Identity::generate();
        let ciphertext = encrypt(&identity.to_public(), b"secret").unwrap();

        assert!(decrypt(&other, &ciphertext).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let identity = age::x25519::Identity::generate();
        let mut ciphertext = encrypt(&identity.to_public(), b"secret").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;

        assert!(decrypt(&identity, &ciphertext).is_err());
    }

    #[test]
    fn load_identity_skips_comments_and_blank_lines() {
        let dir = std::env::temp_dir().join(format!("ripcore-crypto-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("age_key.txt");
        let identity = age::x25519::Identity::generate();
        std::fs::write(&path, format!("# comment\n\n{}\n", identity)).unwrap();

        let loaded = load_identity(&path).unwrap();
        assert_eq!(loaded.to_public().to_string(), identity.to_public().to_string());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn discover_keyfile_prefers_explicit_path() {
        let explicit = PathBuf::from("/some/explicit/path.txt");
        let resolved = discover_keyfile(Some(&explicit), Path::new(".")).unwrap();
        assert_eq!(resolved, explicit);
    }
}
