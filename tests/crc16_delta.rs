use rand::{Rng, SeedableRng};
use saltmine::crc16;

#[test]
fn known_check_value() {
    assert_eq!(crc16::crc16(b"123456789"), 0x31c3);
}

#[test]
fn table_is_the_single_byte_crc() {
    let table = crc16::table();
    assert_eq!(table[0], 0);
    assert_eq!(table[1], 0x1021);
    for b in 0..=255u8 {
        assert_eq!(crc16::crc16(&[b]), table[b as usize]);
    }
}

#[test]
fn delta_table_known_entries() {
    let delta = crc16::delta_pos2();
    assert_eq!(delta[0], 0);
    assert_eq!(delta[1], 0x5946);
    assert_eq!(delta[255], 0x4c76);
}

/// Replacing byte 2 of any 34-byte buffer shifts the CRC by exactly the
/// delta of the new byte value, whatever the surrounding bytes are.
#[test]
fn delta_replaces_byte_two_in_any_context() {
    let delta = crc16::delta_pos2();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for _ in 0..64 {
        let mut buf = [0u8; 34];
        rng.fill(&mut buf[..]);
        buf[2] = 0;
        let base = crc16::crc16(&buf);
        for value in [0u8, 1, 0x5a, 0x85, 0xff, rng.gen()] {
            buf[2] = value;
            assert_eq!(crc16::crc16(&buf), base ^ delta[value as usize]);
            buf[2] = 0;
        }
    }
}
