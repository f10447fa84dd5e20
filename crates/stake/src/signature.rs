//! Proof-of-stake block signatures.
//!
//! A staked block is signed by the key that owns the coinstake's kernel
//! output; proof-of-work blocks must carry no signature at all.

use std::sync::OnceLock;

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use vitaed_primitives::block::Block;
use vitaed_primitives::script::{solve, Destination};

static SECP256K1_VERIFY: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();

fn secp256k1_verify() -> &'static Secp256k1<VerifyOnly> {
    SECP256K1_VERIFY.get_or_init(Secp256k1::verification_only)
}

pub fn check_block_signature(block: &Block) -> bool {
    if !block.is_proof_of_stake() {
        return block.signature.is_empty();
    }
    if block.signature.is_empty() {
        return false;
    }

    // the key is taken from the coinstake's second output
    let coinstake = &block.transactions[1];
    let Some(output) = coinstake.vout.get(1) else {
        return false;
    };
    let Some(Destination::PubKey(pubkey_bytes)) = solve(&output.script_pubkey) else {
        // pay-to-pubkey-hash cannot recover a key to verify against
        return false;
    };

    let Ok(pubkey) = PublicKey::from_slice(&pubkey_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&block.signature) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(&block.header.hash()) else {
        return false;
    };
    secp256k1_verify()
        .verify_ecdsa(&message, &signature, &pubkey)
        .is_ok()
}
