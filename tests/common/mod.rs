//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use busdecode_rs::types::{ChannelId, CursorId, DecodedEvent};

/// Channel id from an index known to be valid
pub fn ch(index: u8) -> ChannelId {
    ChannelId::new(index).expect("channel index in range")
}

/// Cursor id from an index known to be valid
pub fn cursor(index: u8) -> CursorId {
    CursorId::new(index).expect("cursor index in range")
}

/// Assert event start indices never decrease
pub fn assert_ordered<K: std::fmt::Debug>(events: &[DecodedEvent<K>]) {
    for pair in events.windows(2) {
        assert!(
            pair[0].start <= pair[1].start,
            "events out of order: {:?} before {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Event kinds in order
pub fn kinds<K: Copy>(events: &[DecodedEvent<K>]) -> Vec<K> {
    events.iter().map(|e| e.kind).collect()
}
