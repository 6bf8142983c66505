//! 12-byte object identifiers, rendered as 24 lower-case hex characters.
//!
//! Every identifier that arrives from outside (path ids, member and admin
//! lists, filter lists, the `user_id` header) goes through [`ObjectId::parse`].

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

const OBJECT_ID_LEN: usize = 12;
const COUNTER_MASK: u32 = 0x00FF_FFFF;

static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| rand::rng().random());
static COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::rng().random_range(0..=COUNTER_MASK)));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id: {0:?}")]
pub struct ParseObjectIdError(pub String);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

/// What to do with an identifier that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Drop the offending entry and keep going (filter lists).
    SkipInvalid,
    /// Fail the whole batch on the first offending entry (member/admin lists).
    RejectInvalid,
}

impl ObjectId {
    /// Generates a fresh id: 4 bytes of unix seconds, 5 process-random bytes,
    /// 3 bytes of a wrapping counter.
    pub fn generate() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn parse(text: &str) -> Result<Self, ParseObjectIdError> {
        if text.len() != OBJECT_ID_LEN * 2 {
            return Err(ParseObjectIdError(text.to_string()));
        }
        let decoded = hex::decode(text).map_err(|_| ParseObjectIdError(text.to_string()))?;
        let bytes: [u8; OBJECT_ID_LEN] = decoded
            .try_into()
            .map_err(|_| ParseObjectIdError(text.to_string()))?;
        Ok(ObjectId(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Parses a batch of identifiers under the given policy.
pub fn parse_all<S: AsRef<str>>(
    ids: &[S],
    policy: IdPolicy,
) -> Result<Vec<ObjectId>, ParseObjectIdError> {
    let mut parsed = Vec::with_capacity(ids.len());
    for id in ids {
        match ObjectId::parse(id.as_ref()) {
            Ok(object_id) => parsed.push(object_id),
            Err(_) if policy == IdPolicy::SkipInvalid => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(parsed)
}

/// Removes repeated ids, keeping the first occurrence of each.
pub fn dedup_preserving_order(ids: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ObjectId::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "64b7f0c2a1e4d3b2c1a09f8e";

    #[test]
    fn test_parse_valid_hex() {
        let id = ObjectId::parse(VALID).unwrap();
        assert_eq!(id.to_hex(), VALID);
        assert_eq!(id.to_string(), VALID);
    }

    #[test]
    fn test_parse_upper_case_renders_lower_case() {
        let id = ObjectId::parse(&VALID.to_uppercase()).unwrap();
        assert_eq!(id.to_hex(), VALID);
    }

    #[test]
    fn test_parse_rejects_bad_length_and_non_hex() {
        assert!(ObjectId::parse("").is_err());
        assert!(ObjectId::parse("m1").is_err());
        assert!(ObjectId::parse(&VALID[..23]).is_err());
        assert!(ObjectId::parse(&format!("{VALID}00")).is_err());
        assert!(ObjectId::parse("zzb7f0c2a1e4d3b2c1a09f8e").is_err());
    }

    #[test]
    fn test_generate_is_unique_and_round_trips() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_ne!(a, b);
        assert_eq!(ObjectId::parse(&a.to_hex()).unwrap(), a);
    }

    #[test]
    fn test_parse_all_policies() {
        let ids = [VALID, "not-an-id", "64b7f0c2a1e4d3b2c1a09f8f"];

        let skipped = parse_all(&ids, IdPolicy::SkipInvalid).unwrap();
        assert_eq!(skipped.len(), 2);

        let rejected = parse_all(&ids, IdPolicy::RejectInvalid);
        assert_eq!(rejected.unwrap_err(), ParseObjectIdError("not-an-id".to_string()));
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let id = ObjectId::parse(VALID).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{VALID}\""));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ObjectId>("\"nope\"").is_err());
    }
}
