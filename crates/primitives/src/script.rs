//! Script opcodes and the small classifier used by consensus code.

pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_ZEROCOINMINT: u8 = 0xc1;
pub const OP_ZEROCOINSPEND: u8 = 0xc2;
pub const OP_ZEROCOINPUBLICSPEND: u8 = 0xc3;

pub fn is_zerocoin_mint(script: &[u8]) -> bool {
    script.first() == Some(&OP_ZEROCOINMINT)
}

pub fn is_zerocoin_spend(script: &[u8]) -> bool {
    script.first() == Some(&OP_ZEROCOINSPEND)
}

pub fn is_zerocoin_public_spend(script: &[u8]) -> bool {
    script.first() == Some(&OP_ZEROCOINPUBLICSPEND)
}

/// The serialized proof carried after a zerocoin marker opcode.
pub fn zerocoin_payload(script: &[u8]) -> Option<&[u8]> {
    if script.len() < 2 {
        return None;
    }
    match script[0] {
        OP_ZEROCOINMINT | OP_ZEROCOINSPEND | OP_ZEROCOINPUBLICSPEND => Some(&script[1..]),
        _ => None,
    }
}

/// The destinations consensus code needs to understand: pay-to-pubkey and
/// pay-to-pubkey-hash. Everything else is opaque here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    PubKey(Vec<u8>),
    PubKeyHash([u8; 20]),
}

pub fn solve(script: &[u8]) -> Option<Destination> {
    // P2PK: <33|65 byte pubkey> OP_CHECKSIG
    if script.len() >= 2 {
        let push = script[0] as usize;
        if (push == 33 || push == 65)
            && script.len() == push + 2
            && script[push + 1] == OP_CHECKSIG
        {
            return Some(Destination::PubKey(script[1..1 + push].to_vec()));
        }
    }
    // P2PKH: OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[3..23]);
        return Some(Destination::PubKeyHash(hash));
    }
    None
}

pub fn pay_to_pubkey(pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    script
}

pub fn pay_to_pubkey_hash(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_p2pk_and_p2pkh() {
        let pubkey = vec![0x02; 33];
        let script = pay_to_pubkey(&pubkey);
        assert_eq!(solve(&script), Some(Destination::PubKey(pubkey)));

        let hash = [0x11u8; 20];
        let script = pay_to_pubkey_hash(&hash);
        assert_eq!(solve(&script), Some(Destination::PubKeyHash(hash)));

        assert_eq!(solve(&[OP_ZEROCOINMINT]), None);
    }

    #[test]
    fn zerocoin_markers_classify() {
        assert!(is_zerocoin_spend(&[OP_ZEROCOINSPEND, 0x01]));
        assert!(is_zerocoin_public_spend(&[OP_ZEROCOINPUBLICSPEND, 0x01]));
        assert!(is_zerocoin_mint(&[OP_ZEROCOINMINT, 0x01]));
        assert!(!is_zerocoin_spend(&[OP_DUP]));
        assert_eq!(
            zerocoin_payload(&[OP_ZEROCOINSPEND, 0xaa, 0xbb]),
            Some(&[0xaa, 0xbb][..])
        );
        assert_eq!(zerocoin_payload(&[OP_ZEROCOINSPEND]), None);
    }
}
