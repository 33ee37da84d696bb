use rand::{Rng, SeedableRng};
use saltmine::address::{
    self, assemble_repr, decode36, encode36, AddressTag, ADDRESS_CHARS, REPR_BYTES,
};

const ZERO_OWNER: &str = "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c";

#[test]
fn roundtrip_random_buffers() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..256 {
        let mut repr = [0u8; REPR_BYTES];
        rng.fill(&mut repr[..]);
        let encoded = encode36(&repr);
        assert_eq!(encoded.len(), ADDRESS_CHARS);
        assert_eq!(decode36(&encoded).unwrap(), repr);
    }
}

#[test]
fn known_address_vector() {
    // Main hash of the zero owner's code cell salted with 00112233..eeff,
    // fixedPrefixLength 8 and no special flags.
    let hash: [u8; 32] =
        hex::decode("8558a8d92c44957b2a28dafb0039735e46fea9c653da1da2b3da53c878e76523")
            .unwrap()
            .try_into()
            .unwrap();
    let repr = assemble_repr(0x11, 0x00, &hash);
    assert_eq!(repr[34], 0x49);
    assert_eq!(repr[35], 0x34);
    assert_eq!(
        encode36(&repr),
        "EQCFWKjZLESVeyoo2vsAOXNeRv6pxlPaHaKz2lPIeOdlI0k0"
    );
}

#[test]
fn flag_bytes_cover_all_modes() {
    let cases = [
        (false, false, false, 0x11u8, 0x00u8),
        (false, true, false, 0x51, 0x00),
        (true, false, false, 0x11, 0xff),
        (false, false, true, 0x91, 0x00),
        (true, true, true, 0xd1, 0xff),
    ];
    for (masterchain, non_bounceable, testnet, hi, lo) in cases {
        let tag = AddressTag {
            masterchain,
            non_bounceable,
            testnet,
        };
        assert_eq!(tag.flag_bytes(), (hi, lo));
    }
}

#[test]
fn prefix_bits_match_flag_bytes() {
    let tag = AddressTag {
        masterchain: true,
        ..AddressTag::default()
    };
    let bits = tag.prefix_bits();
    let hi: u8 = bits[..8].iter().fold(0, |acc, &b| acc << 1 | b);
    let lo: u8 = bits[8..].iter().fold(0, |acc, &b| acc << 1 | b);
    assert_eq!((hi, lo), tag.flag_bytes());
}

#[test]
fn owner_parsing() {
    let raw = address::decode_owner(ZERO_OWNER).unwrap();
    assert_eq!(raw.len(), 36);
    assert_eq!(raw[1], 0x00);
    assert!(address::decode_owner("EQAA").is_err());
    assert!(address::decode_owner("not base64url!").is_err());
}

#[test]
fn decode_rejects_wrong_lengths() {
    assert!(decode36("EQAA").is_err());
    let long = "A".repeat(49);
    assert!(decode36(&long).is_err());
}
