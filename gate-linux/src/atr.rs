//! ISO/IEC 7816-3 answer-to-reset parsing, enough to pull out the historical bytes.

/// Historical bytes of `atr`, or empty when the ATR is too short or malformed.
pub fn historical_bytes(atr: &[u8]) -> Vec<u8> {
    let t0 = match atr.get(1) {
        Some(&b) => b,
        None => return Vec::new(),
    };
    let count = usize::from(t0 & 0x0F);
    let mut indicator = t0 >> 4;
    let mut pos = 2;
    loop {
        // TA, TB, TC present per bits 0..=2.
        pos += (indicator & 0x07).count_ones() as usize;
        if indicator & 0x08 == 0 {
            break;
        }
        indicator = match atr.get(pos) {
            Some(&td) => td >> 4,
            None => return Vec::new(),
        };
        pos += 1;
    }
    match atr.get(pos..pos + count) {
        Some(hist) => hist.to_vec(),
        None => Vec::new(),
    }
}
