//! Monotonic, sortable 128-bit identifiers (spec.md §4.1).
//!
//! Layout: a 48-bit millisecond timestamp followed by 80 bits of
//! randomness, textualized as 26-character Crockford Base32 — the same
//! shape as a ULID. Within a single process the emitted sequence is
//! strictly increasing even across same-millisecond calls: the random
//! tail is incremented rather than redrawn when the clock hasn't
//! ticked forward.

use rand::RngCore;
use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// A generated identifier: 16 bytes, big-endian (timestamp first), so
/// byte-lexicographic order is generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; 16]);

impl Id {
    /// Build an id directly from its 128-bit value (48-bit ms
    /// timestamp in the high bits, 80-bit tail in the low bits).
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    /// A non-monotonic, fully random id. Used as the fallback when the
    /// process-wide generator has not been initialized (spec.md §4.1:
    /// "falls back to plain random when the generator is not yet
    /// initialized").
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Crockford Base32 text form (26 characters).
    #[must_use]
    pub fn to_base32(&self) -> String {
        let value = self.as_u128();
        let mut out = [0u8; 26];
        let mut v = value;
        for slot in out.iter_mut().rev() {
            *slot = CROCKFORD_ALPHABET[(v & 0x1F) as usize];
            v >>= 5;
        }
        // SAFETY: every byte comes from CROCKFORD_ALPHABET, which is ASCII.
        String::from_utf8(out.to_vec()).expect("crockford alphabet is ASCII")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> serde::Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_base32(&s).ok_or_else(|| serde::de::Error::custom("invalid id encoding"))
    }
}

fn decode_base32(s: &str) -> Option<Id> {
    if s.len() != 26 {
        return None;
    }
    let mut value: u128 = 0;
    for c in s.bytes() {
        let digit = CROCKFORD_ALPHABET.iter().position(|&b| b == c.to_ascii_uppercase())?;
        value = (value << 5) | digit as u128;
    }
    Some(Id::from_u128(value))
}

const TIMESTAMP_BITS: u32 = 48;
const RANDOM_BITS: u32 = 80;
const RANDOM_MASK: u128 = (1u128 << RANDOM_BITS) - 1;

struct GeneratorState {
    last_ms: u64,
    last_random: u128,
}

/// Process-wide monotonic identifier generator.
pub struct IdGenerator {
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                last_ms: 0,
                last_random: 0,
            }),
        }
    }

    fn generate(&self) -> Id {
        let now_ms = current_millis();
        let mut state = self.state.lock().expect("id generator mutex poisoned");

        let (ms, random) = if now_ms > state.last_ms {
            (now_ms, random_tail())
        } else {
            // Clock hasn't advanced (or went backward): stay on the
            // last millisecond and bump the random tail so the
            // sequence is still strictly increasing. On tail overflow,
            // advance the millisecond ourselves rather than going
            // non-monotonic.
            let bumped = state.last_random.wrapping_add(1) & RANDOM_MASK;
            if bumped == 0 {
                (state.last_ms + 1, random_tail())
            } else {
                (state.last_ms, bumped)
            }
        };

        state.last_ms = ms;
        state.last_random = random;

        let value = ((ms as u128) << RANDOM_BITS) | (random & RANDOM_MASK);
        Id::from_u128(value)
    }
}

fn random_tail() -> u128 {
    let mut rng = rand::thread_rng();
    (rng.next_u64() as u128) << 16 | (rng.next_u32() as u128 & 0xFFFF)
}

fn current_millis() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_millis() as u64) & ((1u64 << TIMESTAMP_BITS) - 1)
}

static GENERATOR: OnceLock<IdGenerator> = OnceLock::new();

/// Initialize the process-wide generator. Idempotent; safe to call
/// more than once (only the first call has an effect).
pub fn init() {
    GENERATOR.get_or_init(IdGenerator::new);
}

/// Generate the next identifier. Falls back to [`Id::random`] if
/// [`init`] has not been called yet (spec.md §4.1).
#[must_use]
pub fn next_id() -> Id {
    match GENERATOR.get() {
        Some(generator) => generator.generate(),
        None => Id::random(),
    }
}
