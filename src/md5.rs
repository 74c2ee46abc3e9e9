//! A small vendored MD5 block-compression function.
//!
//! This exists only because [`crate::checksum`] needs the D3D checksum's
//! non-standard padding/length encoding, which requires reading the raw
//! `(a, b, c, d)` registers mid-algorithm rather than going through a
//! standard `Digest::finalize`. No published MD5 crate's public API makes
//! that convenient, and the reference implementation this crate matches
//! (`vkd3d-shader/checksum.c`) vendors its own `3rdparty/md5/md5.h` for the
//! same reason, so this module does the same rather than taking on a crate
//! dependency used for one internal transform.

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

/// Running MD5 state. `update` may be called any number of times with
/// full 64-byte blocks; callers are responsible for padding, exactly as
/// `MD5_Update`/`MD5_Final` split those responsibilities in the reference
/// implementation.
pub struct Md5State {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl Default for Md5State {
    fn default() -> Md5State {
        Md5State {
            a: 0x67452301,
            b: 0xefcdab89,
            c: 0x98badcfe,
            d: 0x10325476,
        }
    }
}

impl Md5State {
    pub fn new() -> Md5State {
        Md5State::default()
    }

    /// Process zero or more full 64-byte blocks. `data.len()` must be a
    /// multiple of 64.
    pub fn update(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len() % 64, 0);
        for block in data.chunks_exact(64) {
            self.compress(block);
        }
    }

    fn compress(&mut self, block: &[u8]) {
        let mut m = [0u32; 16];
        for (i, word) in m.iter_mut().enumerate() {
            *word = u32::from_le_bytes([
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ]);
        }

        let (mut a, mut b, mut c, mut d) = (self.a, self.b, self.c, self.d);

        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let f = f
                .wrapping_add(a)
                .wrapping_add(K[i])
                .wrapping_add(m[g]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(f.rotate_left(S[i]));
        }

        self.a = self.a.wrapping_add(a);
        self.b = self.b.wrapping_add(b);
        self.c = self.c.wrapping_add(c);
        self.d = self.d.wrapping_add(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_matches_known_digest() {
        // Standard MD5 of the zero-length message, computed through the
        // standard single-block padding (0x80 then zeros then 64-bit
        // length), to sanity check the compression function in isolation.
        let mut state = Md5State::new();
        let mut block = [0u8; 64];
        block[0] = 0x80;
        state.update(&block);
        let digest = [state.a, state.b, state.c, state.d];
        let expected = [0xd98c1dd4u32, 0x04b2008fu32, 0x980980e9u32, 0x7e42f8ecu32];
        assert_eq!(digest, expected);
    }
}
