//! Frame packer: turns one completed raw DMA half into a transmit-ready chunk.
//!
//! A chunk is the raw half, optionally reduced from one 4-bit sample per byte to two samples
//! per byte, prefixed with `SYNC_MARKER` when it is the first chunk of a frame. The host finds
//! frame boundaries by searching the stream for the marker.

use crate::config::{BYTES_PER_HALF, MARKER_LEN};

/// Pseudorandom line written ahead of the first chunk of every frame. The host tooling matches
/// these exact bytes.
pub const SYNC_MARKER: [u8; MARKER_LEN] = [
    0x48, 0xc1, 0x20, 0xa3, 0xb3, 0x94, 0x74, 0xc2, 0xa6, 0xb7,
    0xc7, 0x76, 0x1e, 0x07, 0x4c, 0x07, 0xde, 0x00, 0x46, 0x44,
    0x05, 0xc3, 0x96, 0xe6, 0xfe, 0x38, 0xc3, 0x2f, 0x1e, 0x5a,
    0x96, 0xb8, 0x8c, 0x4e, 0x1a, 0x2a, 0x9c, 0xc9, 0xf4, 0x67,
    0x29, 0xbf, 0x5c, 0x55, 0xe6, 0x25, 0xfa, 0x4a, 0xaa, 0x17,
    0xd0, 0x54, 0xaf, 0x0b, 0xd6, 0x4c, 0xdc, 0x8d, 0x63, 0x19,
    0x2f, 0x20, 0xcb, 0x5d, 0xd5, 0x7b, 0x45, 0x5a, 0xb7, 0x36,
    0x1e, 0xdb, 0x7f, 0xde, 0x6e, 0x5e, 0xc1, 0x2c, 0x42, 0x43,
    0x71, 0x97, 0x69, 0xb1, 0x6a, 0x82, 0x78, 0x2d, 0xab, 0xab,
    0xf6, 0x33, 0xef, 0x9f, 0x7f, 0x59, 0xa1, 0xbd, 0x65, 0x9e,
    0x91, 0x29, 0xdf, 0x20, 0x91, 0x07, 0x23, 0x32, 0x1d, 0x2a,
    0xf8, 0xeb, 0x95, 0xc0, 0xe9, 0x6a, 0x90, 0x53, 0x70, 0x89,
    0x11, 0xb3, 0x7b, 0x21, 0xb6, 0x7c, 0xb6, 0xc4, 0x80, 0x47,
    0xba, 0x52, 0x58, 0xcb, 0x35, 0x0a, 0x1b, 0x0a, 0x89, 0xe1,
    0x8c, 0xf7, 0xef, 0xc9, 0x13, 0x4a, 0x05, 0x48, 0x97, 0x0e,
    0x29, 0xf0, 0xc0, 0xcd, 0x15, 0xd7, 0x90, 0x08, 0x36, 0x86,
    0xee, 0x8e, 0x23, 0x37, 0xde, 0x0e, 0xe6, 0xee, 0x78, 0x61,
    0xfe, 0x42, 0xc8, 0xc4, 0x1d, 0x9f, 0xf3, 0xd2, 0x13, 0x98,
    0xc9, 0x34, 0x27, 0xc4, 0xd2, 0x12, 0x8c, 0x1a, 0xdd, 0xbf,
    0x28, 0xf0, 0xd3, 0xdd, 0xdf, 0x49, 0x90, 0x3e, 0xc6, 0xb0,
    0x5a, 0xd1, 0x5b, 0xbd, 0x92, 0xe1, 0xd4, 0xa1, 0x35, 0xe9,
    0x60, 0xbe, 0x79, 0x89, 0x28, 0x4e, 0xa0, 0xdd, 0xdc, 0xcb,
    0xc2, 0xb3, 0x7c, 0x6a, 0x48, 0xe2, 0x84, 0x57, 0x95, 0x56,
    0xbf, 0x34, 0xfb, 0x9f, 0xc3, 0x2b, 0x38, 0x57, 0x64, 0x73,
    0xd8, 0xf2, 0xc1, 0xee, 0x97, 0x61, 0x20, 0xf7, 0x26, 0xc1,
    0x4c, 0x69, 0xfb, 0xe2, 0xd2, 0xb3, 0x27, 0x0e, 0xa7, 0xa7,
    0xaf, 0xf9, 0x36, 0xec, 0xa7, 0x64, 0x2a, 0x69, 0xf7, 0xec,
    0x13, 0xdc, 0x53, 0xa3, 0x39, 0x64, 0x85, 0x0e, 0x1d, 0x10,
    0x49, 0x21, 0xe0, 0xc4, 0x9d, 0xdc, 0xaa, 0x11, 0xe6, 0xfc,
    0xca, 0xfe, 0x37, 0x92, 0x3f, 0xed, 0x4e, 0x0c, 0x69, 0x86,
    0x5f, 0x66, 0x59, 0xfc, 0x7a, 0x95, 0x5b, 0xcd, 0x18, 0xca,
    0x86, 0xac, 0xd4, 0xc8, 0xef, 0x8f, 0x89, 0x2b, 0xe6, 0x2d,
];

/// Number of payload bytes one raw half produces.
pub fn payload_len(pack: bool) -> usize {
    if pack {
        BYTES_PER_HALF / 2
    } else {
        BYTES_PER_HALF
    }
}

/// Combine consecutive bus samples into bytes: `[lo, hi]` becomes `(hi << 4) | lo`, using only
/// the low nibble of each sample. Returns the number of bytes written.
pub fn pack_nibbles(raw: &[u8], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (dst, pair) in out.iter_mut().zip(raw.chunks_exact(2)) {
        *dst = ((pair[1] & 0x0f) << 4) | (pair[0] & 0x0f);
        written += 1;
    }
    written
}

/// Build one chunk from `raw` into `out` and return its length.
///
/// `out` must hold `MARKER_LEN + raw.len()` bytes. The transform always starts at the first byte
/// of `raw` and covers all of it.
pub fn pack_chunk(raw: &[u8], out: &mut [u8], pack: bool, frame_start: bool) -> usize {
    debug_assert!(out.len() >= MARKER_LEN + raw.len());

    let mut len = 0;
    if frame_start {
        out[..MARKER_LEN].copy_from_slice(&SYNC_MARKER);
        len += MARKER_LEN;
    }

    let payload = &mut out[len..];
    if pack {
        len += pack_nibbles(raw, payload);
    } else {
        payload[..raw.len()].copy_from_slice(raw);
        len += raw.len();
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PACKED_HALF_LEN;
    use proptest::prelude::*;

    #[test]
    fn packs_low_nibble_first() {
        let raw = [0x01, 0x02, 0xf3, 0x14, 0x0a, 0x0b];
        let mut out = [0u8; 3];
        assert_eq!(pack_nibbles(&raw, &mut out), 3);
        assert_eq!(out, [0x21, 0x43, 0xba]);
    }

    #[test]
    fn marker_only_on_frame_start() {
        let raw = vec![0x55u8; BYTES_PER_HALF];
        let mut out = vec![0u8; PACKED_HALF_LEN];

        let len = pack_chunk(&raw, &mut out, false, true);
        assert_eq!(len, MARKER_LEN + BYTES_PER_HALF);
        assert_eq!(&out[..MARKER_LEN], &SYNC_MARKER[..]);
        assert!(out[MARKER_LEN..len].iter().all(|b| *b == 0x55));

        let len = pack_chunk(&raw, &mut out, false, false);
        assert_eq!(len, BYTES_PER_HALF);
        assert_ne!(&out[..MARKER_LEN], &SYNC_MARKER[..]);
    }

    #[test]
    fn packed_chunk_is_half_the_raw_size() {
        let raw = vec![0x0fu8; BYTES_PER_HALF];
        let mut out = vec![0u8; PACKED_HALF_LEN];
        assert_eq!(pack_chunk(&raw, &mut out, true, false), payload_len(true));
        assert_eq!(
            pack_chunk(&raw, &mut out, true, true),
            MARKER_LEN + BYTES_PER_HALF / 2
        );
        assert!(out[MARKER_LEN..MARKER_LEN + BYTES_PER_HALF / 2]
            .iter()
            .all(|b| *b == 0xff));
    }

    proptest! {
        #[test]
        fn packing_matches_nibble_formula(raw in prop::collection::vec(any::<u8>(), 0..512)) {
            let even = &raw[..raw.len() & !1];
            let mut out = vec![0u8; even.len() / 2];
            prop_assert_eq!(pack_nibbles(even, &mut out), even.len() / 2);
            for (i, byte) in out.iter().enumerate() {
                let lo = even[2 * i] & 0x0f;
                let hi = even[2 * i + 1] & 0x0f;
                prop_assert_eq!(*byte, (hi << 4) | lo);
            }
        }

        #[test]
        fn unpacked_chunk_is_identity(raw in prop::collection::vec(any::<u8>(), BYTES_PER_HALF)) {
            let mut out = vec![0u8; PACKED_HALF_LEN];
            let len = pack_chunk(&raw, &mut out, false, false);
            prop_assert_eq!(&out[..len], &raw[..]);
        }
    }
}
