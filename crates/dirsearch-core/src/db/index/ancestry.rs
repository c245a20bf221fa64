//! Module: index::ancestry
//! Responsibility: ancestor-chain reads and the ancestors-index subtree skip key.
//! Does not own: cursor repositioning after the skip (the positioner re-seeks).
//! Boundary: callers hand in the current object row; this module never moves it.
//!
//! The ancestors column stores identifiers in their column encoding, root
//! first and the object itself last. The ancestors index orders entries by
//! that raw byte pattern, not by numeric identifier value.

use crate::{
    db::store::{RowColumns, read_bytes_into},
    error::InternalError,
    types::{ColumnId, Dnt},
};

///
/// AncestorBlob
///
/// Reusable ancestor buffer owned by the search session. It is refreshed on
/// every positioning step and never cached across rows; a whole-subtree walk
/// would otherwise hold one chain per visited object.
///

#[derive(Debug, Default)]
pub struct AncestorBlob {
    bytes: Vec<u8>,
}

impl AncestorBlob {
    #[must_use]
    pub fn with_capacity(ids: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(ids.saturating_mul(Dnt::ENCODED_LEN)),
        }
    }

    /// Build a blob from an explicit chain (root first).
    #[must_use]
    pub fn from_chain(chain: &[Dnt]) -> Self {
        Self {
            bytes: encode_chain(chain),
        }
    }

    /// Re-read the ancestors column of the current object row, growing the
    /// buffer and retrying once when the column does not fit.
    pub fn fetch<R>(&mut self, row: &mut R) -> Result<(), InternalError>
    where
        R: RowColumns + ?Sized,
    {
        let found = read_bytes_into(&mut self.bytes, |buf| {
            row.retrieve_column(ColumnId::Ancestors, buf)
        })?;
        if !found {
            return Err(InternalError::store_corruption(
                "object row has no ancestors value",
            ));
        }
        if self.bytes.len() % Dnt::ENCODED_LEN != 0 {
            return Err(InternalError::store_corruption(format!(
                "ancestors value length {} is not a multiple of {}",
                self.bytes.len(),
                Dnt::ENCODED_LEN
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = Dnt> + '_ {
        self.bytes.chunks_exact(Dnt::ENCODED_LEN).map(|chunk| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            Dnt::from_column_bytes(raw)
        })
    }

    /// Linear scan for `dnt` anywhere in the chain.
    #[must_use]
    pub fn contains(&self, dnt: Dnt) -> bool {
        self.iter().any(|ancestor| ancestor == dnt)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / Dnt::ENCODED_LEN
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode a chain (root first) in column form.
#[must_use]
pub fn encode_chain(chain: &[Dnt]) -> Vec<u8> {
    chain.iter().flat_map(|dnt| dnt.to_column_bytes()).collect()
}

/// Smallest ancestors-index key past every descendant of the object whose
/// ancestor blob is `blob`.
///
/// The final identifier's bytes are read as a big-endian number and
/// incremented, so the result is the byte-order successor of the object's
/// own key prefix. An all-ones identifier carries into the previous one.
/// `None` means no key can follow the subtree.
#[must_use]
pub fn next_subtree_lower_bound(blob: &[u8]) -> Option<Vec<u8>> {
    let mut key = blob.to_vec();
    key.truncate(key.len() - key.len() % Dnt::ENCODED_LEN);

    while key.len() >= Dnt::ENCODED_LEN {
        let split = key.len() - Dnt::ENCODED_LEN;
        let mut last = [0u8; 4];
        last.copy_from_slice(&key[split..]);

        if let Some(next) = u32::from_be_bytes(last).checked_add(1) {
            key[split..].copy_from_slice(&next.to_be_bytes());
            return Some(key);
        }

        key.truncate(split);
    }

    None
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn successor_increments_byte_pattern_not_numeric_value() {
        // dnt 0x0100 is stored as 00 01 00 00; the byte pattern successor
        // is 00 01 00 01, which is dnt 0x01000100 numerically.
        let blob = encode_chain(&[Dnt::ROOT, Dnt(0x0100)]);
        let next = next_subtree_lower_bound(&blob).expect("successor exists");

        assert_eq!(&next[..4], &Dnt::ROOT.to_column_bytes());
        assert_eq!(&next[4..], &[0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn all_ones_identifier_carries_into_parent() {
        let blob = encode_chain(&[Dnt(5), Dnt(u32::MAX)]);
        let next = next_subtree_lower_bound(&blob).expect("successor exists");

        assert_eq!(next, vec![0x05, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn saturated_chain_has_no_successor() {
        assert_eq!(next_subtree_lower_bound(&encode_chain(&[Dnt(u32::MAX)])), None);
        assert_eq!(next_subtree_lower_bound(&[]), None);
    }

    #[test]
    fn contains_scans_whole_chain() {
        let blob = AncestorBlob::from_chain(&[Dnt::ROOT, Dnt(10), Dnt(44)]);

        assert!(blob.contains(Dnt(10)));
        assert!(blob.contains(Dnt(44)));
        assert!(!blob.contains(Dnt(11)));
        assert_eq!(blob.len(), 3);
    }

    proptest! {
        #[test]
        fn successor_is_past_every_descendant_and_not_past_next_sibling(
            chain in prop::collection::vec(1u32..u32::MAX, 1..6),
            suffix in prop::collection::vec(any::<u32>(), 0..4),
            sibling_tail in any::<u32>(),
        ) {
            let chain: Vec<Dnt> = chain.into_iter().map(Dnt).collect();
            let blob = encode_chain(&chain);
            let bound = next_subtree_lower_bound(&blob).expect("non-saturated chain has a successor");

            // Every descendant key sorts strictly below the bound.
            let mut descendant = blob.clone();
            for id in &suffix {
                descendant.extend_from_slice(&Dnt(*id).to_column_bytes());
            }
            prop_assert!(bound > descendant);

            // Any later sibling (same parent, larger byte pattern) sorts at
            // or above the bound.
            let (parent, own) = blob.split_at(blob.len() - 4);
            let sibling = Dnt(sibling_tail).to_column_bytes();
            if sibling.as_slice() > own {
                let mut sibling_key = parent.to_vec();
                sibling_key.extend_from_slice(&sibling);
                prop_assert!(sibling_key >= bound);
            }
        }
    }
}
