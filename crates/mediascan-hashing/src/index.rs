//! Known-hash index abstraction and an in-memory BK-tree implementation

use crate::hash::{HashType, HashValue, IndexMatch, PHOTODNA_LEN};
use async_trait::async_trait;
use mediascan_core::{Error, Result};
use parking_lot::RwLock;
use std::collections::{btree_map, BTreeMap, HashMap};
use tracing::debug;

/// Bounded-distance lookup over known hash databases.
///
/// Implementations return every stored hash within `max_distance` (inclusive)
/// of the query. Hashes of different types are never compared.
#[async_trait]
pub trait HashIndex: Send + Sync {
    async fn search_phash(&self, hash: u64, max_distance: u32) -> Result<Vec<IndexMatch>>;

    async fn search_pdq(&self, hash: &[u8; 32], max_distance: u32) -> Result<Vec<IndexMatch>>;

    async fn search_photodna(&self, hash: &[u8], max_distance: u32) -> Result<Vec<IndexMatch>>;

    /// Store a known hash. `value` must be of `hash_type`.
    async fn add_hash(
        &self,
        hash_type: HashType,
        value: HashValue,
        database: &str,
        classification: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    database: String,
    classification: String,
}

#[derive(Debug)]
struct Node {
    value: HashValue,
    entries: Vec<Entry>,
    children: BTreeMap<u32, Node>,
}

impl Node {
    fn leaf(value: HashValue, entry: Entry) -> Self {
        Self {
            value,
            entries: vec![entry],
            children: BTreeMap::new(),
        }
    }
}

/// Burkhard-Keller tree over one hash type
#[derive(Debug, Default)]
struct BkTree {
    root: Option<Node>,
    len: usize,
}

impl BkTree {
    fn insert(&mut self, value: HashValue, entry: Entry) -> Result<()> {
        let mut node = match self.root {
            Some(ref mut root) => root,
            None => {
                self.root = Some(Node::leaf(value, entry));
                self.len += 1;
                return Ok(());
            }
        };

        loop {
            let d = node.value.distance(&value)?;
            if d == 0 {
                let duplicate = node.entries.iter().any(|e| {
                    e.database == entry.database && e.classification == entry.classification
                });
                if !duplicate {
                    node.entries.push(entry);
                    self.len += 1;
                }
                return Ok(());
            }
            node = match node.children.entry(d) {
                btree_map::Entry::Occupied(child) => child.into_mut(),
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(Node::leaf(value, entry));
                    self.len += 1;
                    return Ok(());
                }
            };
        }
    }

    fn search(&self, query: &HashValue, max_distance: u32) -> Result<Vec<(u32, &Entry)>> {
        let mut found = Vec::new();
        let mut pending: Vec<&Node> = self.root.iter().collect();

        while let Some(node) = pending.pop() {
            let d = node.value.distance(query)?;
            if d <= max_distance {
                found.extend(node.entries.iter().map(|e| (d, e)));
            }
            let low = d.saturating_sub(max_distance);
            let high = d.saturating_add(max_distance);
            pending.extend(node.children.range(low..=high).map(|(_, child)| child));
        }

        found.sort_by_key(|(d, _)| *d);
        Ok(found)
    }
}

/// In-process index holding one BK-tree per hash type.
///
/// PhotoDNA hits carry a confidence of `1 - distance / 1152`; pHash and PDQ
/// hits leave confidence to the caller.
#[derive(Debug, Default)]
pub struct MemoryHashIndex {
    trees: RwLock<HashMap<HashType, BkTree>>,
}

impl MemoryHashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored (hash, database, classification) entries across all types
    pub fn len(&self) -> usize {
        self.trees.read().values().map(|t| t.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, query: HashValue, max_distance: u32) -> Result<Vec<IndexMatch>> {
        let hash_type = query.hash_type();
        let trees = self.trees.read();
        let Some(tree) = trees.get(&hash_type) else {
            return Ok(Vec::new());
        };

        let matches: Vec<IndexMatch> = tree
            .search(&query, max_distance)?
            .into_iter()
            .map(|(distance, entry)| IndexMatch {
                distance,
                database: entry.database.clone(),
                classification: entry.classification.clone(),
                confidence: match hash_type {
                    HashType::PhotoDna => {
                        Some(1.0 - distance as f32 / hash_type.bit_length() as f32)
                    }
                    _ => None,
                },
            })
            .collect();

        debug!(
            hash_type = %hash_type,
            max_distance,
            matches = matches.len(),
            "Searched in-memory hash index"
        );
        Ok(matches)
    }
}

#[async_trait]
impl HashIndex for MemoryHashIndex {
    async fn search_phash(&self, hash: u64, max_distance: u32) -> Result<Vec<IndexMatch>> {
        self.search(HashValue::Phash(hash), max_distance)
    }

    async fn search_pdq(&self, hash: &[u8; 32], max_distance: u32) -> Result<Vec<IndexMatch>> {
        self.search(HashValue::Pdq(*hash), max_distance)
    }

    async fn search_photodna(&self, hash: &[u8], max_distance: u32) -> Result<Vec<IndexMatch>> {
        if hash.len() != PHOTODNA_LEN {
            return Err(Error::validation(format!(
                "PhotoDNA hash must be {} bytes, got {}",
                PHOTODNA_LEN,
                hash.len()
            )));
        }
        self.search(HashValue::PhotoDna(hash.to_vec()), max_distance)
    }

    async fn add_hash(
        &self,
        hash_type: HashType,
        value: HashValue,
        database: &str,
        classification: &str,
    ) -> Result<()> {
        if value.hash_type() != hash_type {
            return Err(Error::validation(format!(
                "Expected a {} hash, got {}",
                hash_type,
                value.hash_type()
            )));
        }
        if let HashValue::PhotoDna(bytes) = &value {
            if bytes.len() != PHOTODNA_LEN {
                return Err(Error::validation(format!(
                    "PhotoDNA hash must be {} bytes, got {}",
                    PHOTODNA_LEN,
                    bytes.len()
                )));
            }
        }

        let entry = Entry {
            database: database.to_string(),
            classification: classification.to_string(),
        };
        self.trees
            .write()
            .entry(hash_type)
            .or_default()
            .insert(value, entry)
    }
}
