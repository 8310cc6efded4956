//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 6 digits, 30 s).
//!
//! Everything here sits on the login path, so malformed secrets and codes
//! come back as `false` or an empty string instead of an error.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::rngs::OsRng;
use sha1::Sha1;

use crate::config::TwoFactorSettings;
use crate::utils::base32::{ALPHABET, decode_base32};

pub const PERIOD: u64 = 30;
pub const DIGITS: u32 = 6;
pub const DEFAULT_SECRET_LENGTH: usize = 32;
const MIN_SECRET_LENGTH: usize = 16;
const MAX_SECRET_LENGTH: usize = 64;
const MIN_RECOVERY_CODES: usize = 4;
const MAX_RECOVERY_CODES: usize = 12;
const MAX_WINDOW: u32 = 10;

const RECOVERY_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Everything except RFC 3986 unreserved characters.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn time_step(unix_seconds: u64) -> u64 {
    unix_seconds / PERIOD
}

/// HOTP value for a raw key and counter, or `None` when the key is empty.
fn hotp(key: &[u8], counter: u64) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let mut mac = HmacSha1::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest.last()? & 0x0f);
    let window = digest.get(offset..offset + 4)?;
    let binary = (u32::from(window[0] & 0x7f) << 24)
        | (u32::from(window[1]) << 16)
        | (u32::from(window[2]) << 8)
        | u32::from(window[3]);

    let code = binary % 10u32.pow(DIGITS);
    Some(format!("{:0width$}", code, width = DIGITS as usize))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn normalize_code(code: &str) -> Option<String> {
    let digits: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == DIGITS as usize && digits.bytes().all(|b| b.is_ascii_digit()))
        .then_some(digits)
}

#[derive(Clone, Debug)]
pub struct TwoFactorAuthenticator {
    issuer: String,
    window: u32,
    recovery_code_count: usize,
}

impl TwoFactorAuthenticator {
    pub fn new(settings: &TwoFactorSettings) -> Self {
        Self {
            issuer: settings.issuer.clone(),
            window: settings.window.min(MAX_WINDOW),
            recovery_code_count: settings.recovery_code_count,
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn recovery_code_count(&self) -> usize {
        self.recovery_code_count
    }

    /// Random Base32 secret; `length` is clamped to 16..=64 characters.
    pub fn generate_secret(&self, length: usize) -> String {
        let length = length.clamp(MIN_SECRET_LENGTH, MAX_SECRET_LENGTH);
        let mut rng = OsRng;
        (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// Google Authenticator key URI.
    pub fn provisioning_uri(&self, account: &str, secret: &str) -> String {
        let issuer = utf8_percent_encode(&self.issuer, URI_COMPONENT).to_string();
        let account = utf8_percent_encode(account, URI_COMPONENT);
        format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={PERIOD}"
        )
    }

    pub fn current_code(&self, secret: &str) -> String {
        self.code_at(secret, unix_now())
    }

    pub fn code_at(&self, secret: &str, unix_seconds: u64) -> String {
        hotp(&decode_base32(secret), time_step(unix_seconds)).unwrap_or_default()
    }

    pub fn verify_code(&self, secret: &str, code: &str, window: u32) -> bool {
        self.verify_code_at(secret, code, window, unix_now())
    }

    pub fn verify_code_at(&self, secret: &str, code: &str, window: u32, unix_seconds: u64) -> bool {
        self.matching_step(secret, code, window, unix_seconds).is_some()
    }

    /// Time step the code matched, used to reject replays of the same step.
    pub fn matching_step(
        &self,
        secret: &str,
        code: &str,
        window: u32,
        unix_seconds: u64,
    ) -> Option<u64> {
        let code = normalize_code(code)?;
        let key = decode_base32(secret);
        if key.is_empty() {
            return None;
        }

        let window = u64::from(window.min(MAX_WINDOW));
        let current = time_step(unix_seconds);
        let mut matched = None;
        // Every step in the window is checked so timing does not reveal which one matched.
        for step in current.saturating_sub(window)..=current.saturating_add(window) {
            if let Some(candidate) = hotp(&key, step) {
                if constant_time_eq(candidate.as_bytes(), code.as_bytes()) && matched.is_none() {
                    matched = Some(step);
                }
            }
        }
        matched
    }

    /// `count` codes (clamped to 4..=12) in `XXXX-XXXX` form.
    pub fn generate_recovery_codes(&self, count: usize) -> Vec<String> {
        let count = count.clamp(MIN_RECOVERY_CODES, MAX_RECOVERY_CODES);
        let mut rng = OsRng;
        let mut group = || -> String {
            (0..4)
                .map(|_| RECOVERY_ALPHABET[rng.gen_range(0..RECOVERY_ALPHABET.len())] as char)
                .collect()
        };
        (0..count)
            .map(|_| format!("{}-{}", group(), group()))
            .collect()
    }
}

/// Canonical form a user-typed recovery code is compared in.
pub fn normalize_recovery_code(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (compact.len() == 8).then(|| format!("{}-{}", &compact[..4], &compact[4..]))
}
