use crate::error::Result;
use crate::lock_error;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use tracing::info;

/// Длина PIN в цифрах
pub const PIN_LENGTH: usize = 6;

/// SHA-256 от строки в нижнем регистре hex
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

fn check_pin_format(pin: &str) -> Result<()> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(lock_error!(invalid_credential, "PIN должен состоять из {} цифр", PIN_LENGTH));
    }
    Ok(())
}

/// Хранилище хеша PIN. В памяти держится только хеш, сам PIN - никогда.
#[derive(Default)]
pub struct CredentialStore {
    hashed_pin: RwLock<Option<String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hash(hashed_pin: Option<String>) -> Self {
        Self {
            hashed_pin: RwLock::new(hashed_pin.map(|hash| hash.to_lowercase())),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.hashed_pin.read().is_some()
    }

    /// Хеш для `credential.pin_sha256`
    pub fn hashed_pin(&self) -> Option<String> {
        self.hashed_pin.read().clone()
    }

    pub fn set_pin(&self, pin: &str) -> Result<()> {
        check_pin_format(pin)?;
        *self.hashed_pin.write() = Some(sha256_hex(pin));
        info!("PIN установлен");
        Ok(())
    }

    /// Неверный формат или отсутствие PIN - просто `false`
    pub fn validate_pin(&self, pin: &str) -> bool {
        if check_pin_format(pin).is_err() {
            return false;
        }
        match self.hashed_pin.read().as_deref() {
            Some(stored) => stored == sha256_hex(pin),
            None => false,
        }
    }

    pub fn change_pin(&self, old_pin: &str, new_pin: &str) -> Result<()> {
        if !self.validate_pin(old_pin) {
            return Err(lock_error!(invalid_credential, "старый PIN неверен"));
        }
        self.set_pin(new_pin)
    }
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, text: &str) -> Result<String> {
    write!(output, "{}", text)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(lock_error!(invalid_credential, "ввод прерван"));
    }
    Ok(line.trim().to_string())
}

/// Установка или смена PIN в терминале. Если PIN уже настроен, сначала
/// спрашивается текущий. Возвращает хеш нового PIN.
pub fn setup_pin<R: BufRead, W: Write>(store: &CredentialStore, mut input: R, mut output: W) -> Result<String> {
    let current = if store.is_configured() {
        Some(prompt(&mut input, &mut output, "Текущий PIN: ")?)
    } else {
        None
    };

    let new_pin = prompt(&mut input, &mut output, &format!("Новый PIN ({} цифр): ", PIN_LENGTH))?;
    let repeated = prompt(&mut input, &mut output, "Повторите PIN: ")?;
    if new_pin != repeated {
        return Err(lock_error!(invalid_credential, "PIN не совпадает"));
    }

    match current {
        Some(current) => store.change_pin(&current, &new_pin)?,
        None => store.set_pin(&new_pin)?,
    }

    store
        .hashed_pin()
        .ok_or_else(|| lock_error!(internal, "PIN не сохранён"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockError;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("123456"),
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }

    #[test]
    fn test_set_and_validate() {
        let store = CredentialStore::new();
        assert!(!store.is_configured());
        assert!(!store.validate_pin("123456"));

        store.set_pin("123456").unwrap();
        assert!(store.validate_pin("123456"));
        assert!(!store.validate_pin("654321"));
        assert!(!store.validate_pin("12345"));
    }

    #[test]
    fn test_rejects_malformed_pin() {
        let store = CredentialStore::new();
        assert!(matches!(store.set_pin("12ab56"), Err(LockError::InvalidCredential(_))));
        assert!(matches!(store.set_pin("1234567"), Err(LockError::InvalidCredential(_))));
        assert!(!store.is_configured());
    }

    #[test]
    fn test_change_pin_requires_old_pin() {
        let store = CredentialStore::from_hash(Some(sha256_hex("111111")));

        assert!(store.change_pin("000000", "222222").is_err());
        assert!(store.validate_pin("111111"));

        store.change_pin("111111", "222222").unwrap();
        assert!(store.validate_pin("222222"));
        assert!(!store.validate_pin("111111"));
    }

    #[test]
    fn test_from_hash_is_case_insensitive() {
        let store = CredentialStore::from_hash(Some(sha256_hex("123456").to_uppercase()));
        assert!(store.validate_pin("123456"));
    }

    #[test]
    fn test_setup_pin_sets_first_pin() {
        let store = CredentialStore::new();
        let mut output = Vec::new();

        let hash = setup_pin(&store, &b"123456\n123456\n"[..], &mut output).unwrap();

        assert_eq!(hash, sha256_hex("123456"));
        assert!(store.validate_pin("123456"));
        assert!(String::from_utf8(output).unwrap().contains("Повторите PIN"));
    }

    #[test]
    fn test_setup_pin_changes_existing_pin() {
        let store = CredentialStore::from_hash(Some(sha256_hex("111111")));

        let hash = setup_pin(&store, &b"111111\n222222\n222222\n"[..], Vec::new()).unwrap();
        assert_eq!(hash, sha256_hex("222222"));

        let result = setup_pin(&store, &b"000000\n333333\n333333\n"[..], Vec::new());
        assert!(matches!(result, Err(LockError::InvalidCredential(_))));
        assert!(store.validate_pin("222222"));
    }

    #[test]
    fn test_setup_pin_rejects_mismatch_and_bad_format() {
        let store = CredentialStore::new();

        let result = setup_pin(&store, &b"123456\n654321\n"[..], Vec::new());
        assert!(matches!(result, Err(LockError::InvalidCredential(_))));

        let result = setup_pin(&store, &b"12ab\n12ab\n"[..], Vec::new());
        assert!(matches!(result, Err(LockError::InvalidCredential(_))));

        let result = setup_pin(&store, &b""[..], Vec::new());
        assert!(matches!(result, Err(LockError::InvalidCredential(_))));
        assert!(!store.is_configured());
    }
}
