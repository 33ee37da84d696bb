use saltmine::{compile, MinerOptions, SaltmineError};

const ZERO_OWNER: &str = "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c";

fn base_options() -> MinerOptions {
    MinerOptions {
        owner: ZERO_OWNER.to_string(),
        case_sensitive: true,
        ..MinerOptions::default()
    }
}

#[test]
fn case_sensitive_start_masks() {
    let mut opts = base_options();
    opts.start = Some("WERTY".into());
    let cfg = compile(&opts).unwrap();

    // With the default flags the first free digit is character 3.
    assert_eq!(cfg.start_digit_base, 3);

    // 'W' lands in the free first-byte window.
    assert_eq!(cfg.free_window_mask, 0xff);
    assert_eq!(cfg.free_hash_mask, 0x3f);
    assert_eq!(cfg.free_hash_val, 0x16);

    // 'E', 'R', 'T', 'Y' force bytes 3..=5 completely.
    assert_eq!(cfg.prefix_mask[3], 0xff);
    assert_eq!(cfg.prefix_val[3], 0x11);
    assert_eq!(cfg.prefix_mask[4], 0xff);
    assert_eq!(cfg.prefix_val[4], 0x14);
    assert_eq!(cfg.prefix_mask[5], 0xff);
    assert_eq!(cfg.prefix_val[5], 0xd8);
    assert_eq!(cfg.prefix_pos_nocrc, vec![3, 4, 5]);
    assert!(cfg.prefix_pos_crc.is_empty());

    assert!(!cfg.need_crc);
    assert!(!cfg.sweep_hash0);
    assert!(cfg.case_const.is_empty());
    assert!(cfg.case_var.is_empty());

    // Two unforced window bits leave four admissible first bytes.
    assert_eq!(cfg.hash0_values, vec![0x16, 0x56, 0x96, 0xd6]);
}

#[test]
fn case_insensitive_start_partition() {
    let mut opts = base_options();
    opts.start = Some("WeRtY".into());
    opts.case_sensitive = false;
    let cfg = compile(&opts).unwrap();

    // One ambiguous letter per character; only 'W' touches the first
    // hash byte, so it alone must be re-evaluated per candidate.
    assert_eq!(cfg.case_var.len(), 1);
    assert_eq!(cfg.case_var[0].bit, 18);
    assert_eq!((cfg.case_var[0].alt0, cfg.case_var[0].alt1), (22, 48));
    let const_bits: Vec<u16> = cfg.case_const.iter().map(|c| c.bit).collect();
    assert_eq!(const_bits, vec![24, 30, 36, 42]);

    assert!(!cfg.need_crc);
    assert!(cfg.sweep_hash0, "byte-2 case checks force the sweep path");
}

#[test]
fn case_insensitive_end_partition() {
    let mut opts = base_options();
    opts.end = Some("ABCDEF".into());
    opts.case_sensitive = false;
    let cfg = compile(&opts).unwrap();

    let const_bits: Vec<u16> = cfg.case_const.iter().map(|c| c.bit).collect();
    let var_bits: Vec<u16> = cfg.case_var.iter().map(|c| c.bit).collect();
    assert_eq!(const_bits, vec![252, 258, 264]);
    assert_eq!(var_bits, vec![270, 276, 282]);
    assert!(cfg.need_crc);
    assert!(cfg.sweep_hash0);
    // Scan mode: no free window, a single pass-through candidate.
    assert_eq!(cfg.hash0_values, vec![0]);
}

#[test]
fn suffix_sets_crc_positions() {
    let mut opts = base_options();
    opts.end = Some("zy".into());
    let cfg = compile(&opts).unwrap();
    assert_eq!(cfg.prefix_pos_crc, vec![34, 35]);
    assert!(cfg.need_crc);
    assert_ne!(cfg.prefix_mask[34], 0);
    assert_eq!(cfg.prefix_mask[35], 0xff);
}

#[test]
fn masterchain_flags() {
    let mut opts = base_options();
    opts.end = Some("z".into());
    opts.masterchain = true;
    let cfg = compile(&opts).unwrap();
    assert_eq!(cfg.flags_hi, 0x11);
    assert_eq!(cfg.flags_lo, 0xff);
}

#[test]
fn non_bounceable_testnet_flags() {
    let mut opts = base_options();
    opts.end = Some("z".into());
    opts.non_bounceable = true;
    opts.testnet = true;
    let cfg = compile(&opts).unwrap();
    assert_eq!(cfg.flags_hi, 0xd1);
    assert_eq!(cfg.flags_lo, 0x00);
}

#[test]
fn combined_start_and_end() {
    let mut opts = base_options();
    opts.start = Some("ABCD".into());
    opts.end = Some("zy".into());
    let cfg = compile(&opts).unwrap();
    // 'A' matches the zero workchain nibble, so the pattern slides one
    // character earlier than a window-only prefix would.
    assert_eq!(cfg.start_digit_base, 2);
    // Start forces bytes 3 and 4, suffix forces the CRC tail.
    assert!(cfg.prefix_pos_nocrc.contains(&3));
    assert!(cfg.prefix_pos_nocrc.contains(&4));
    assert_eq!(cfg.prefix_pos_crc, vec![34, 35]);
    assert!(cfg.need_crc);
}

#[test]
fn rejects_unalignable_suffix() {
    let mut opts = base_options();
    opts.end = Some("Z".repeat(48));
    assert!(matches!(compile(&opts), Err(SaltmineError::Spec(_))));
}

#[test]
fn rejects_overlong_patterns() {
    let mut opts = base_options();
    opts.start = Some("A".repeat(49));
    assert!(compile(&opts).is_err());
    let mut opts = base_options();
    opts.end = Some("A".repeat(49));
    assert!(compile(&opts).is_err());
}

#[test]
fn rejects_owner_that_is_not_an_address() {
    let mut opts = base_options();
    opts.owner = "EQAA".into();
    opts.end = Some("z".into());
    assert!(compile(&opts).is_err());
}
