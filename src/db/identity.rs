use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Opaque, stable identity of a connecting client
/// Uses CSPRNG bytes so identities cannot be guessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Identity used for calls originating from the world itself (init, scheduled jobs)
    pub const MODULE: Identity = Identity([0u8; 32]);

    /// Generate a new random identity
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Try to create from a slice
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

static LAST_TIMESTAMP_US: AtomicU64 = AtomicU64::new(0);

/// Microseconds since the Unix epoch, never decreasing within a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const UNIX_EPOCH: Timestamp = Timestamp(0);

    pub fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        // fetch_max returns the previous value; the clock never steps backwards
        let prev = LAST_TIMESTAMP_US.fetch_max(wall, Ordering::AcqRel);
        Self(prev.max(wall))
    }

    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_generate_unique() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a, b);
        assert_ne!(a, Identity::MODULE);
    }

    #[test]
    fn test_identity_display_is_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let text = Identity::from_bytes(bytes).to_string();
        assert_eq!(text.len(), 64);
        assert!(text.starts_with("ab00"));
        assert!(text.ends_with("01"));
    }

    #[test]
    fn test_identity_try_from_slice() {
        let id = Identity::generate();
        assert_eq!(Identity::try_from_slice(id.as_bytes()), Some(id));
        assert_eq!(Identity::try_from_slice(&[1, 2, 3]), None);
    }

    #[test]
    fn test_timestamp_monotonic() {
        let mut prev = Timestamp::now();
        for _ in 0..1000 {
            let next = Timestamp::now();
            assert!(next >= prev);
            prev = next;
        }
        assert!(prev > Timestamp::UNIX_EPOCH);
    }

    #[test]
    fn test_timestamp_duration_since() {
        let a = Timestamp::from_micros(1_000);
        let b = Timestamp::from_micros(3_500);
        assert_eq!(b.duration_since(a), Duration::from_micros(2_500));
        assert_eq!(a.duration_since(b), Duration::ZERO);
    }
}
