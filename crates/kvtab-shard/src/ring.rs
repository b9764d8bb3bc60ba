use std::collections::BTreeMap;

/// Virtual nodes placed on the ring per shard.
pub const VIRTUAL_NODES: usize = 160;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Consistent-hash ring mapping keys to shard indexes.
///
/// Built once from the configured shard names; a key always lands on the
/// same index for the same name list.
#[derive(Clone, Debug)]
pub struct HashRing {
    points: BTreeMap<u64, usize>,
    shards: usize,
}

impl HashRing {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let mut points = BTreeMap::new();
        for (index, name) in names.iter().enumerate() {
            for vnode in 0..VIRTUAL_NODES {
                let label = format!("{}#{vnode}", name.as_ref());
                points.entry(fnv1a(label.as_bytes())).or_insert(index);
            }
        }
        Self {
            points,
            shards: names.len(),
        }
    }

    /// Index of the shard owning `key`. `None` for an empty ring.
    pub fn locate(&self, key: &str) -> Option<usize> {
        let hash = fnv1a(key.as_bytes());
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, index)| *index)
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }
}
