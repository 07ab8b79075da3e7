//! World-state access: composite keys and the stub traits
//!
//! Every component receives the state through a `ChaincodeStub` argument;
//! nothing in this crate holds ledger state of its own.
//!
//! Composite keys use the NUL character as delimiter and refuse attributes
//! that contain it, so two different attribute tuples can never encode to
//! the same string and a partial key never matches a longer object type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::StateError;

pub const DELIMITER: char = '\u{0}';

/// Structured ledger key: an object type followed by ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey {
    object_type: String,
    attributes: Vec<String>,
}

impl CompositeKey {
    pub fn new<I, S>(object_type: &str, attributes: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if object_type.is_empty() {
            return Err(StateError::InvalidKey {
                reason: "empty object type".to_string(),
            });
        }
        check_part(object_type)?;

        let attributes = attributes
            .into_iter()
            .map(|a| {
                let a = a.as_ref();
                check_part(a)?;
                Ok(a.to_string())
            })
            .collect::<Result<Vec<_>, StateError>>()?;

        Ok(Self {
            object_type: object_type.to_string(),
            attributes,
        })
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Storage encoding: `\0type\0attr1\0attr2\0`
    pub fn encode(&self) -> String {
        encode_parts(&self.object_type, self.attributes.iter().map(String::as_str))
    }

    /// Inverse of `encode`.
    pub fn decode(encoded: &str) -> Result<Self, StateError> {
        let inner = encoded
            .strip_prefix(DELIMITER)
            .and_then(|s| s.strip_suffix(DELIMITER))
            .ok_or_else(|| StateError::InvalidKey {
                reason: format!("not a composite key: {:?}", encoded),
            })?;

        let mut parts = inner.split(DELIMITER);
        let object_type = parts.next().unwrap_or_default();
        Self::new(object_type, parts)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.object_type)?;
        for attr in &self.attributes {
            write!(f, ", {}", attr)?;
        }
        write!(f, ")")
    }
}

fn check_part(part: &str) -> Result<(), StateError> {
    if part.contains(DELIMITER) {
        return Err(StateError::InvalidKey {
            reason: format!("key part contains the delimiter: {:?}", part),
        });
    }
    Ok(())
}

fn encode_parts<'a>(object_type: &str, attributes: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    out.push(DELIMITER);
    out.push_str(object_type);
    out.push(DELIMITER);
    for attr in attributes {
        out.push_str(attr);
        out.push(DELIMITER);
    }
    out
}

/// Encoded prefix selecting every key of `object_type` whose leading
/// attributes equal `attributes`.
pub fn partial_key_prefix(object_type: &str, attributes: &[&str]) -> Result<String, StateError> {
    let key = CompositeKey::new(object_type, attributes)?;
    Ok(key.encode())
}

/// Entries of an ordered map whose key starts with `prefix`, in key order.
pub(crate) fn scan_prefix<'a, V>(
    map: &'a BTreeMap<String, V>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a String, &'a V)> + 'a {
    map.range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
        .take_while(move |(k, _)| k.starts_with(prefix))
}

/// Key-value access to the world state.
///
/// Reads take `&mut self` because a hosting ledger records every read for
/// its conflict check.
pub trait StateStore {
    fn get_state(&mut self, key: &CompositeKey) -> Result<Option<Vec<u8>>, StateError>;

    fn put_state(&mut self, key: &CompositeKey, value: Vec<u8>) -> Result<(), StateError>;

    /// All entries under a partial key, in key order.
    fn get_state_by_partial_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<(CompositeKey, Vec<u8>)>, StateError>;
}

/// Transaction context handed to the chaincode for one invocation.
pub trait ChaincodeStub: StateStore {
    /// Transaction id assigned by the host
    fn tx_id(&self) -> &str;

    /// Transaction timestamp assigned by the host (never the local clock)
    fn tx_timestamp(&self) -> i64;

    fn set_event(&mut self, name: &str, payload: Vec<u8>);
}

/// Read and decode a JSON value.
pub fn get_json<T, S>(store: &mut S, key: &CompositeKey) -> Result<Option<T>, StateError>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    match store.get_state(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub fn put_json<T, S>(store: &mut S, key: &CompositeKey, value: &T) -> Result<(), StateError>
where
    T: Serialize,
    S: StateStore + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    store.put_state(key, bytes)
}

/// Decode every JSON value under a partial key.
pub fn scan_json<T, S>(
    store: &mut S,
    object_type: &str,
    attributes: &[&str],
) -> Result<Vec<(CompositeKey, T)>, StateError>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    store
        .get_state_by_partial_key(object_type, attributes)?
        .into_iter()
        .map(|(key, bytes)| Ok((key, serde_json::from_slice(&bytes)?)))
        .collect()
}

/// In-memory stub without versioning or commit, for unit tests.
#[derive(Debug, Default)]
pub struct MockStub {
    state: BTreeMap<String, Vec<u8>>,
    tx_id: String,
    timestamp: i64,
    events: Vec<(String, Vec<u8>)>,
}

impl MockStub {
    pub fn new(tx_id: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            ..Self::default()
        }
    }

    /// Start the next simulated transaction.
    pub fn set_tx(&mut self, tx_id: impl Into<String>, timestamp: i64) {
        self.tx_id = tx_id.into();
        self.timestamp = timestamp;
    }

    pub fn events(&self) -> &[(String, Vec<u8>)] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl StateStore for MockStub {
    fn get_state(&mut self, key: &CompositeKey) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.state.get(&key.encode()).cloned())
    }

    fn put_state(&mut self, key: &CompositeKey, value: Vec<u8>) -> Result<(), StateError> {
        self.state.insert(key.encode(), value);
        Ok(())
    }

    fn get_state_by_partial_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<(CompositeKey, Vec<u8>)>, StateError> {
        let prefix = partial_key_prefix(object_type, attributes)?;
        scan_prefix(&self.state, &prefix)
            .map(|(k, v)| Ok((CompositeKey::decode(k)?, v.clone())))
            .collect()
    }
}

impl ChaincodeStub for MockStub {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) {
        self.events.push((name.to_string(), payload));
    }
}
