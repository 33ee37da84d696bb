//! TON cell serialization for the vanity contract.
//!
//! Two cells matter to the search. The code cell is 80 bytes: descriptor
//! pair, a 50-bit code constant, the owner `MsgAddressInt`, a 179-bit code
//! constant, then the 128-bit salt. The StateInit cell is a short variant
//! prefix (descriptors, header bits, ref depth) followed by the code cell
//! hash. Everything here is built bit-exactly so the account hash computed
//! by the kernel matches what the chain would derive.

use crate::error::SaltmineError;

/// Leading 50 bits of the contract code.
const CODE_HEAD: u64 = 0x0003c92fe24a3421;
const CODE_HEAD_BITS: u32 = 50;

/// Trailing 179 bits of the contract code, big-endian with 5 zero pad bits
/// at the top of the first byte.
const CODE_TAIL: [u8; 23] = [
    0x04, 0xc7, 0x05, 0xf2, 0xe3, 0x21, 0xd4, 0xd4, 0x30, 0xed, 0x54, 0xfb, 0x04, 0xdb, 0x30,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const CODE_TAIL_BITS: usize = 179;

pub const CODE_CELL_BYTES: usize = 80;
pub const CODE_DATA_BITS: usize = 624;
pub const SALT_BYTES: usize = 16;

/// MSB-first bit packer for cell payloads. Fields are fed as whole
/// values; completed bytes drain out of a small accumulator.
struct BitPacker {
    bytes: Vec<u8>,
    acc: u32,
    pending: u32,
}

impl BitPacker {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            acc: 0,
            pending: 0,
        }
    }

    fn len_bits(&self) -> usize {
        self.bytes.len() * 8 + self.pending as usize
    }

    /// Append the low `width` bits of `value`, most significant first.
    fn push(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 64);
        let mut left = width;
        while left > 0 {
            let take = left.min(8 - self.pending);
            left -= take;
            let chunk = (value >> left) as u32 & ((1 << take) - 1);
            self.acc = (self.acc << take) | chunk;
            self.pending += take;
            if self.pending == 8 {
                self.bytes.push(self.acc as u8);
                self.acc = 0;
                self.pending = 0;
            }
        }
    }

    fn push_bytes(&mut self, data: &[u8]) {
        for &b in data {
            self.push(b as u64, 8);
        }
    }

    /// Append the low `bits` bits of a big-endian byte string wider than
    /// one word.
    fn push_wide(&mut self, data: &[u8], bits: usize) {
        let mut skip = data.len() * 8 - bits;
        for &b in data {
            if skip >= 8 {
                skip -= 8;
                continue;
            }
            let width = 8 - skip as u32;
            self.push(b as u64 & ((1 << width) - 1), width);
            skip = 0;
        }
    }

    /// Finish a byte-aligned payload.
    fn into_aligned(self) -> Vec<u8> {
        assert_eq!(self.pending, 0, "payload is not byte aligned");
        self.bytes
    }

    /// Finish with TON completion padding: a single 1 bit then zeros.
    fn into_padded(mut self) -> Vec<u8> {
        if self.pending > 0 {
            let fill = 8 - self.pending;
            self.push(1 << (fill - 1), fill);
        }
        self.bytes
    }
}

/// Descriptor byte `d2`: floor(bits/8) + ceil(bits/8).
fn bits_descriptor(bits: usize) -> u8 {
    (bits / 8 + (bits + 7) / 8) as u8
}

/// Serialize the code cell for one owner and salt.
pub fn build_code_cell(
    owner_raw: &[u8],
    salt: &[u8; SALT_BYTES],
) -> Result<[u8; CODE_CELL_BYTES], SaltmineError> {
    if owner_raw.len() < 34 {
        return Err(SaltmineError::Spec(
            "owner address payload is too short".into(),
        ));
    }
    let mut packer = BitPacker::new();
    packer.push(CODE_HEAD, CODE_HEAD_BITS);
    // MsgAddressInt: tag 10, no anycast, then workchain i8 and the hash
    packer.push(0b100, 3);
    packer.push(owner_raw[1] as u64, 8);
    packer.push_bytes(&owner_raw[2..34]);
    packer.push_wide(&CODE_TAIL, CODE_TAIL_BITS);
    packer.push_bytes(salt);
    debug_assert_eq!(packer.len_bits(), CODE_DATA_BITS);
    let data = packer.into_aligned();

    let mut cell = [0u8; CODE_CELL_BYTES];
    cell[0] = 0x00; // no refs
    cell[1] = bits_descriptor(CODE_DATA_BITS);
    cell[2..].copy_from_slice(&data);
    Ok(cell)
}

/// StateInit prefix bytes for one (fixed prefix length, special) variant:
/// descriptor pair, padded header bits and the 2-byte ref depth. The code
/// cell hash is appended after this prefix to form the hashed message.
pub fn stateinit_prefix(
    fixed_prefix_length: Option<u8>,
    special: Option<(bool, bool)>,
) -> Result<Vec<u8>, SaltmineError> {
    let mut packer = BitPacker::new();

    match fixed_prefix_length {
        Some(len) => {
            if len >= 32 {
                return Err(SaltmineError::Spec(
                    "fixed prefix length must be 0..32".into(),
                ));
            }
            // present flag plus the 5-bit length
            packer.push(0x20 | len as u64, 6);
        }
        None => packer.push(0, 1),
    }

    match special {
        Some((tick, tock)) => {
            packer.push(0b100 | (tick as u64) << 1 | tock as u64, 3)
        }
        None => packer.push(0, 1),
    }

    packer.push(0b100, 3); // code present, data absent, libraries empty

    let bits = packer.len_bits();
    let padded = packer.into_padded();

    let mut out = Vec::with_capacity(2 + padded.len() + 2);
    out.push(0x01); // ordinary cell, one ref
    out.push(bits_descriptor(bits));
    out.extend_from_slice(&padded);
    out.extend_from_slice(&[0x00, 0x00]); // ref depth
    Ok(out)
}

/// Pack prefix bytes into big-endian message words, zero beyond the prefix.
pub fn pack_prefix_words(prefix: &[u8]) -> [u32; 16] {
    let mut words = [0u32; 16];
    for (i, &b) in prefix.iter().enumerate() {
        words[i / 4] |= (b as u32) << (24 - 8 * (i % 4));
    }
    words
}

/// Serialize a single root cell with no refs into a minimal Bag of Cells,
/// without index and without CRC32C.
pub fn to_boc_single_cell(cell: &[u8]) -> Vec<u8> {
    let size_bytes = 1usize; // one cell
    let total = cell.len();
    let off_bytes = ((usize::BITS - total.leading_zeros() + 7) / 8).max(1) as usize;

    let mut out = Vec::with_capacity(7 + size_bytes * 4 + off_bytes + total);
    out.extend_from_slice(&[0xb5, 0xee, 0x9c, 0x72]);
    out.push(size_bytes as u8); // no index, no crc, no cache bits
    out.push(off_bytes as u8);
    out.push(1); // cells
    out.push(1); // roots
    out.push(0); // absent
    out.extend_from_slice(&total.to_be_bytes()[std::mem::size_of::<usize>() - off_bytes..]);
    out.push(0); // root index
    out.extend_from_slice(cell);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::decode_owner;

    const ZERO_OWNER: &str = "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c";

    #[test]
    fn code_cell_known_bytes() {
        let owner = decode_owner(ZERO_OWNER).unwrap();
        let cell = build_code_cell(&owner, &[0u8; 16]).unwrap();
        let expected = concat!(
            "009cf24bf8928d0860000000000000000000000000000000000000000000",
            "000000000000000000000004c705f2e321d4d430ed54fb04db3000000000",
            "0000000000000000000000000000000000000000",
        );
        assert_eq!(hex::encode(cell), expected);
    }

    #[test]
    fn salt_occupies_last_sixteen_bytes() {
        let owner = decode_owner(ZERO_OWNER).unwrap();
        let salt: [u8; 16] = *b"0123456789abcdef";
        let cell = build_code_cell(&owner, &salt).unwrap();
        assert_eq!(&cell[64..], &salt);
    }

    #[test]
    fn stateinit_prefix_known_bytes() {
        let cases: [(Option<u8>, Option<(bool, bool)>, &str); 5] = [
            (None, None, "0101240000"),
            (None, Some((false, false)), "0101490000"),
            (Some(8), None, "0103a1200000"),
            (Some(8), Some((false, true)), "0103a2c80000"),
            (Some(0), Some((true, true)), "010383c80000"),
        ];
        for (fpl, special, expected) in cases {
            let prefix = stateinit_prefix(fpl, special).unwrap();
            assert_eq!(hex::encode(&prefix), expected, "{fpl:?} {special:?}");
        }
    }

    #[test]
    fn stateinit_prefix_rejects_wide_prefix_length() {
        assert!(stateinit_prefix(Some(32), None).is_err());
    }

    #[test]
    fn prefix_word_packing() {
        let prefix = stateinit_prefix(Some(8), None).unwrap();
        let words = pack_prefix_words(&prefix);
        assert_eq!(words[0], 0x0103a120);
        assert_eq!(words[1], 0x00000000);
        assert!(words[2..].iter().all(|&w| w == 0));
    }

    #[test]
    fn boc_known_bytes() {
        let owner = decode_owner(ZERO_OWNER).unwrap();
        let salt = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let cell = build_code_cell(&owner, &salt).unwrap();
        let boc = to_boc_single_cell(&cell);
        assert_eq!(boc.len(), 91);
        assert_eq!(&boc[..4], &[0xb5, 0xee, 0x9c, 0x72]);
        assert_eq!(boc[6], 1);
        assert_eq!(boc[9], 0x50);
        assert_eq!(&boc[11..], &cell[..]);
    }
}
