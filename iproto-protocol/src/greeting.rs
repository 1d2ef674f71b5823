//! Server greeting and CHAP-SHA1 authentication scramble.
//!
//! The greeting is a fixed 128-byte block sent by the server right after
//! the TCP connection is accepted:
//!
//! ```text
//! [0, 64)    version line, e.g. "Tarantool 2.11.1 (Binary) <uuid>"
//! [64, 108)  base64-encoded salt
//! [108, 128) padding
//! ```

use crate::error::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};

/// Size of the greeting block in bytes.
pub const GREETING_SIZE: usize = 128;

/// End of the version line within the greeting.
pub const VERSION_LINE_END: usize = 64;

/// End of the base64 salt within the greeting.
pub const SALT_END: usize = 108;

/// Size of a SHA-1 digest, the salt prefix and the scramble.
pub const SCRAMBLE_SIZE: usize = 20;

/// Authentication mechanism name sent in AUTH requests.
pub const CHAP_SHA1: &str = "chap-sha1";

/// Parsed server greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    line: String,
    version: Option<String>,
    protocol: Option<String>,
    salt: Vec<u8>,
}

impl Greeting {
    /// Parses a 128-byte greeting block.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < GREETING_SIZE {
            return Err(ProtocolError::InvalidGreeting(format!(
                "expected {} bytes, got {}",
                GREETING_SIZE,
                bytes.len()
            )));
        }

        let line = String::from_utf8_lossy(&bytes[..VERSION_LINE_END])
            .trim_end_matches(['\n', ' ', '\0'])
            .to_string();

        let encoded = std::str::from_utf8(&bytes[VERSION_LINE_END..SALT_END])
            .map_err(|_| ProtocolError::InvalidGreeting("salt is not ASCII".to_string()))?
            .trim();
        let mut salt = STANDARD
            .decode(encoded)
            .map_err(|e| ProtocolError::InvalidGreeting(format!("bad salt: {}", e)))?;
        if salt.len() < SCRAMBLE_SIZE {
            return Err(ProtocolError::InvalidGreeting(format!(
                "salt too short: {} bytes",
                salt.len()
            )));
        }
        salt.truncate(SCRAMBLE_SIZE);

        Ok(Self {
            version: extract_version(&line),
            protocol: extract_protocol(&line),
            line,
            salt,
        })
    }

    /// Builds a greeting block, as a server would send it.
    pub fn build(line: &str, salt: &[u8]) -> Vec<u8> {
        let mut block = vec![b' '; GREETING_SIZE];
        let line = &line.as_bytes()[..line.len().min(VERSION_LINE_END - 1)];
        block[..line.len()].copy_from_slice(line);
        block[VERSION_LINE_END - 1] = b'\n';

        let encoded = STANDARD.encode(salt);
        let encoded = &encoded.as_bytes()[..encoded.len().min(SALT_END - VERSION_LINE_END)];
        block[VERSION_LINE_END..VERSION_LINE_END + encoded.len()].copy_from_slice(encoded);
        block[GREETING_SIZE - 1] = b'\n';
        block
    }

    /// Full first line of the greeting.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Server version token, e.g. `2.11.1-0-g96877bd`.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Protocol name announced in parentheses, e.g. `Binary`.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// First 20 bytes of the decoded session salt.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

/// Extracts the version token from a greeting line.
///
/// Picks the longest run of digits and dots (preferring runs that contain
/// a dot), extended by a trailing alphanumeric/dash suffix.
pub fn extract_version(line: &str) -> Option<String> {
    let bytes = line.as_bytes();
    let mut best: Option<(usize, usize, bool)> = None;
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        let dotted = bytes[start..i].contains(&b'.');
        let better = match best {
            None => true,
            Some((s, e, best_dotted)) => {
                (dotted && !best_dotted) || (dotted == best_dotted && i - start > e - s)
            }
        };
        if better {
            best = Some((start, i, dotted));
        }
    }

    let (start, mut end, _) = best?;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-') {
        end += 1;
    }
    Some(line[start..end].trim_end_matches('.').to_string())
}

fn extract_protocol(line: &str) -> Option<String> {
    let open = line.find('(')?;
    let close = line[open..].find(')')? + open;
    Some(line[open + 1..close].to_string())
}

/// Byte-wise XOR of two equal-length buffers.
pub fn xor(left: &[u8], right: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if left.len() != right.len() {
        return Err(ProtocolError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(left.iter().zip(right).map(|(a, b)| a ^ b).collect())
}

/// Computes the CHAP-SHA1 scramble for `password` under `salt`.
///
/// `scramble = SHA1(password) XOR SHA1(salt[..20] ++ SHA1(SHA1(password)))`
pub fn scramble(salt: &[u8], password: &str) -> Result<Vec<u8>, ProtocolError> {
    if salt.len() < SCRAMBLE_SIZE {
        return Err(ProtocolError::InvalidGreeting(format!(
            "salt too short: {} bytes",
            salt.len()
        )));
    }

    let step1 = Sha1::digest(password.as_bytes());
    let step2 = Sha1::digest(step1);

    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE]);
    hasher.update(step2);
    let step3 = hasher.finalize();

    xor(&step1, &step3)
}
