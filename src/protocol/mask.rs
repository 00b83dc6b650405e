//! Payload masking (RFC 6455 Section 5.3) and mask key generation.

use std::cell::Cell;

/// XOR `data` with the 4-byte `mask`, one byte at a time.
///
/// Masking is its own inverse: applying the same key twice restores the input.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Same result as [`apply_mask`], processing four bytes per step.
///
/// ```
/// use rswc::protocol::mask::apply_mask_fast;
///
/// let mut data = b"Hello".to_vec();
/// apply_mask_fast(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
/// assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
/// ```
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    // chunks are 4-aligned, so the tail restarts at mask[0]
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}

thread_local! {
    static MASK_STATE: Cell<u32> = Cell::new(random_mask_seed());
}

/// Seed for the per-thread mask generator.
///
/// Mask keys only need to be unpredictable to intermediaries, so a
/// failing entropy source falls back to the clock instead of failing
/// the write.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Produce a fresh mask key for an outgoing frame.
pub fn generate_mask() -> [u8; 4] {
    MASK_STATE.with(|state| {
        let next = state.get().wrapping_add(0x9E37_79B9);
        state.set(next);
        let b = next.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        c.wrapping_mul(0xC2B2_AE35).to_le_bytes()
    })
}
