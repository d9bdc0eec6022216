//! Stream resynchroniser for the framed sensor protocol.
//!
//! Wire format: `STX(0xAA 0x55) | LEN | PAYLOAD(LEN) | CKS`, where `LEN`
//! counts payload bytes only and `CKS` is the XOR of every byte from `LEN`
//! through the last payload byte. Payload length is bounded at 64 bytes.
//!
//! The finder consumes an arbitrarily sliced byte stream and emits whole,
//! checksum-valid payload blocks. A corrupted or truncated frame never
//! blocks subsequent frames: on any validation failure the bytes after the
//! offending STX pair are re-scanned, so a start marker embedded in a
//! corrupt region is still honoured.

use std::collections::VecDeque;

/// Maximum payload length a frame may declare.
pub const MAX_PAYLOAD_LEN: u8 = 64;

const STX_1: u8 = 0xAA;
const STX_2: u8 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitStx1,
    WaitStx2,
    WaitLength,
    ReadPayload,
    VerifyChecksum,
}

/// Incremental packet scanner with an internal byte reservoir.
///
/// `feed()` appends bytes and advances the state machine as far as it can;
/// completed payloads queue up in arrival order for `take()`.
pub struct PacketFinder {
    reservoir: VecDeque<u8>,
    state: State,
    declared_length: u8,
    /// LEN byte plus payload gathered so far, kept for re-scan on failure
    frame: Vec<u8>,
    ready: VecDeque<Vec<u8>>,
    checksum_failures: u64,
}

impl PacketFinder {
    pub fn new() -> Self {
        Self {
            reservoir: VecDeque::with_capacity(256),
            state: State::WaitStx1,
            declared_length: 0,
            frame: Vec::with_capacity(MAX_PAYLOAD_LEN as usize + 1),
            ready: VecDeque::new(),
            checksum_failures: 0,
        }
    }

    /// Append bytes and advance. Returns `true` when at least one new valid
    /// payload was assembled and is available via [`take`](Self::take).
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        self.reservoir.extend(bytes);
        let before = self.ready.len();

        while let Some(b) = self.reservoir.pop_front() {
            match self.state {
                State::WaitStx1 => {
                    if b == STX_1 {
                        self.state = State::WaitStx2;
                    }
                }
                State::WaitStx2 => {
                    if b == STX_2 {
                        self.state = State::WaitLength;
                    } else if b != STX_1 {
                        // another 0xAA restarts the marker, anything else resyncs
                        self.state = State::WaitStx1;
                    }
                }
                State::WaitLength => {
                    if b == 0 || b > MAX_PAYLOAD_LEN {
                        log::warn!("Invalid frame length {}, resyncing", b);
                        self.rescan_from(&[b]);
                    } else {
                        self.declared_length = b;
                        self.frame.clear();
                        self.frame.push(b);
                        self.state = State::ReadPayload;
                    }
                }
                State::ReadPayload => {
                    self.frame.push(b);
                    if self.frame.len() == self.declared_length as usize + 1 {
                        self.state = State::VerifyChecksum;
                    }
                }
                State::VerifyChecksum => {
                    let cs = self.frame.iter().fold(0u8, |acc, &x| acc ^ x);
                    if cs == b {
                        self.ready.push_back(self.frame[1..].to_vec());
                        self.frame.clear();
                        self.state = State::WaitStx1;
                    } else {
                        self.checksum_failures += 1;
                        log::warn!(
                            "Checksum mismatch (expected 0x{:02X}, got 0x{:02X}), dropping frame",
                            cs,
                            b
                        );
                        let bad: Vec<u8> = self.frame.drain(..).chain(std::iter::once(b)).collect();
                        self.rescan_from(&bad[..]);
                    }
                }
            }
        }

        self.ready.len() > before
    }

    /// Move out the oldest assembled payload (STX, LEN and CKS stripped).
    pub fn take(&mut self) -> Option<Vec<u8>> {
        self.ready.pop_front()
    }

    /// How many bytes the caller may productively read next: 1 while
    /// syncing, remaining payload plus checksum while mid-frame.
    pub fn bytes_needed_hint(&self) -> usize {
        match self.state {
            State::ReadPayload => self.declared_length as usize - self.frame.len() + 2,
            _ => 1,
        }
    }

    /// Count of frames dropped for checksum mismatch since construction.
    pub fn checksum_failures(&self) -> u64 {
        self.checksum_failures
    }

    /// Push failed-frame bytes back for re-scanning and restart the marker
    /// search. The STX pair that opened the bad frame stays consumed.
    fn rescan_from(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.reservoir.push_front(b);
        }
        self.frame.clear();
        self.state = State::WaitStx1;
    }
}

impl Default for PacketFinder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u8;
        let cks = payload.iter().fold(len, |acc, &b| acc ^ b);
        let mut out = vec![STX_1, STX_2, len];
        out.extend_from_slice(payload);
        out.push(cks);
        out
    }

    #[test]
    fn test_valid_single_frame() {
        // AA 55 03 01 01 FF CKS with CKS = 03 ^ 01 ^ 01 ^ FF
        let bytes = frame(&[0x01, 0x01, 0xFF]);
        assert_eq!(bytes, vec![0xAA, 0x55, 0x03, 0x01, 0x01, 0xFF, 0xFC]);

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x01, 0x01, 0xFF]));
        assert_eq!(finder.take(), None);
        assert_eq!(finder.checksum_failures(), 0);
    }

    #[test]
    fn test_noise_before_frame() {
        let mut bytes = vec![0x00, 0xAA, 0x00];
        bytes.extend(frame(&[0x01, 0x01, 0xFF]));

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x01, 0x01, 0xFF]));
    }

    #[test]
    fn test_aa_run_before_stx2() {
        // AA AA 55 ... : the second AA must restart the marker, not resync
        let mut bytes = vec![0xAA];
        bytes.extend(frame(&[0x42]));

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x42]));
    }

    #[test]
    fn test_corrupt_checksum_then_recovery() {
        let mut bad = frame(&[0x01, 0x01, 0xFF]);
        *bad.last_mut().unwrap() ^= 0xFF;
        let good = frame(&[0x02, 0x03]);

        let mut finder = PacketFinder::new();
        assert!(!finder.feed(&bad));
        assert_eq!(finder.take(), None);
        assert_eq!(finder.checksum_failures(), 1);

        assert!(finder.feed(&good));
        assert_eq!(finder.take(), Some(vec![0x02, 0x03]));
    }

    #[test]
    fn test_byte_at_a_time_slicing() {
        let bytes = frame(&[0x01, 0x01, 0xFF]);
        let mut finder = PacketFinder::new();
        let mut got = Vec::new();
        for &b in &bytes {
            if finder.feed(&[b]) {
                got.push(finder.take().unwrap());
            }
        }
        assert_eq!(got, vec![vec![0x01, 0x01, 0xFF]]);
    }

    #[test]
    fn test_two_frames_one_feed() {
        let mut bytes = frame(&[0x01]);
        bytes.extend(frame(&[0x02]));

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x01]));
        assert_eq!(finder.take(), Some(vec![0x02]));
        assert_eq!(finder.take(), None);
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut bytes = vec![0xAA, 0x55, 0x00, 0x00];
        bytes.extend(frame(&[0x07]));

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x07]));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut bytes = vec![0xAA, 0x55, 0x7F];
        bytes.extend(frame(&[0x07]));

        let mut finder = PacketFinder::new();
        assert!(finder.feed(&bytes));
        assert_eq!(finder.take(), Some(vec![0x07]));
    }

    #[test]
    fn test_frame_hidden_in_corrupt_payload_is_recovered() {
        // A bad frame whose declared length swallows a real frame: the
        // re-scan after the checksum failure must still find the real one.
        let inner = frame(&[0x0A, 0x0B]);
        let mut bytes = vec![0xAA, 0x55, 0x08];
        bytes.extend_from_slice(&inner); // 6 bytes of "payload"
        bytes.extend_from_slice(&[0x00, 0x00]); // pad to declared 8
        bytes.push(0x00); // wrong checksum

        let mut finder = PacketFinder::new();
        finder.feed(&bytes);
        assert_eq!(finder.take(), Some(vec![0x0A, 0x0B]));
    }

    #[test]
    fn test_random_prefix_then_frame() {
        let noise: Vec<u8> = (0u16..200).map(|i| (i.wrapping_mul(31) % 251) as u8).collect();
        let mut bytes = noise;
        bytes.extend(frame(&[0x01, 0x02, 0x03, 0x04]));

        let mut finder = PacketFinder::new();
        finder.feed(&bytes);
        let mut last = None;
        while let Some(p) = finder.take() {
            last = Some(p);
        }
        assert_eq!(last, Some(vec![0x01, 0x02, 0x03, 0x04]));
    }

    #[test]
    fn test_bytes_needed_hint() {
        let mut finder = PacketFinder::new();
        assert_eq!(finder.bytes_needed_hint(), 1);

        finder.feed(&[0xAA, 0x55, 0x05]);
        // payload not yet started: 5 payload bytes + checksum
        assert_eq!(finder.bytes_needed_hint(), 6);

        finder.feed(&[0x01, 0x02]);
        assert_eq!(finder.bytes_needed_hint(), 4);
    }
}
