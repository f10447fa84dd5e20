use std::sync::Arc;

use primitive_types::U256;
use vitaed_chainstate::state::{ChainState, ConnectContext};
use vitaed_chainstate::supply::InvalidOutpoints;
use vitaed_chainstate::{ChainStateError, TxOutSource, ZerocoinError};
use vitaed_consensus::money::COIN;
use vitaed_consensus::params::{consensus_params, ConsensusParams};
use vitaed_consensus::{Hash256, Network};
use vitaed_primitives::block::{merkle_root, Block, BlockHeader};
use vitaed_primitives::outpoint::OutPoint;
use vitaed_primitives::script::{OP_ZEROCOINMINT, OP_ZEROCOINSPEND};
use vitaed_primitives::transaction::{Transaction, TxIn, TxOut};
use vitaed_stake::{ScriptVerifier, TxResolver};
use vitaed_storage::memory::MemoryStore;
use vitaed_zerocoin::denomination::Denomination;
use vitaed_zerocoin::spend::{CoinSpend, SpendType};
use vitaed_zerocoin::DigestBindingVerifier;

const TEST_BITS: u32 = 0x207fffff;

struct NoResolver;

impl TxResolver for NoResolver {
    fn transaction(&self, _txid: &Hash256) -> Option<(Transaction, Hash256)> {
        None
    }
}

struct AllowAllScripts;

impl ScriptVerifier for AllowAllScripts {
    fn verify_unlock(
        &self,
        _script_sig: &[u8],
        _script_pubkey: &[u8],
        _tx: &Transaction,
        _input_index: usize,
    ) -> bool {
        true
    }
}

struct NoOutputs;

impl TxOutSource for NoOutputs {
    fn output(&self, _txid: &Hash256, _index: u32) -> Option<TxOut> {
        None
    }
}

fn test_params() -> ConsensusParams {
    let mut params = consensus_params(Network::Regtest);
    params.last_pow_block = i32::MAX;
    params.height_start_zc = 1;
    params.height_start_zc_public_spends = i32::MAX;
    params.height_start_zc_serials_v2 = i32::MAX;
    params
}

fn coinbase_tx(height: u32, extra_vout: Vec<TxOut>) -> Transaction {
    let mut vout = vec![TxOut {
        value: 100 * COIN,
        script_pubkey: vec![0x51],
    }];
    vout.extend(extra_vout);
    Transaction {
        version: 1,
        vin: vec![TxIn {
            prevout: OutPoint::null(),
            script_sig: height.to_le_bytes().to_vec(),
            sequence: u32::MAX,
        }],
        vout,
        lock_time: 0,
    }
}

fn mint_output(denomination: Denomination, tag: u8) -> TxOut {
    let mut script = vec![OP_ZEROCOINMINT];
    script.extend_from_slice(&[tag; 33]);
    TxOut {
        value: denomination.amount(),
        script_pubkey: script,
    }
}

fn blind_spend_tx(denomination: Denomination, serial: u64, payout: i64) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        vin: Vec::new(),
        vout: vec![TxOut {
            value: payout,
            script_pubkey: vec![0x51],
        }],
        lock_time: 0,
    };
    let spend = CoinSpend {
        denomination,
        ptx_hash: tx.outputs_hash(),
        accumulator_checksum: 3,
        serial: U256::from(serial),
        proof: vec![0x0a; 8],
        version: 1,
        pubkey: Vec::new(),
        signature: Vec::new(),
        spend_type: SpendType::Spend,
    };
    let mut script_sig = vec![OP_ZEROCOINSPEND];
    script_sig.extend_from_slice(&spend.consensus_encode());
    tx.vin.push(TxIn {
        prevout: OutPoint::null(),
        script_sig,
        sequence: denomination.value() as u32,
    });
    tx
}

fn mine_block(prev_block: Hash256, time: u32, transactions: Vec<Transaction>) -> Block {
    let txids: Vec<Hash256> = transactions.iter().map(|tx| tx.txid()).collect();
    let (root, _) = merkle_root(&txids);
    let target = vitaed_pow::compact::compact_to_u256(TEST_BITS).expect("target");
    let mut header = BlockHeader {
        version: 5,
        prev_block,
        merkle_root: root,
        time,
        bits: TEST_BITS,
        nonce: 0,
        accumulator_checkpoint: [0u8; 32],
    };
    loop {
        let hash = header.hash();
        if U256::from_little_endian(&hash) <= target {
            break;
        }
        header.nonce += 1;
    }
    Block {
        header,
        transactions,
        signature: Vec::new(),
    }
}

fn connect_ctx<'a>(invalid: &'a InvalidOutpoints) -> ConnectContext<'a> {
    ConnectContext {
        resolver: &NoResolver,
        scripts: &AllowAllScripts,
        outputs: &NoOutputs,
        proofs: &DigestBindingVerifier,
        invalid,
    }
}

#[test]
fn mint_spend_and_cross_block_double_spend() {
    let store = Arc::new(MemoryStore::new());
    let mut state = ChainState::new(Arc::clone(&store), test_params());
    let invalid = InvalidOutpoints::new();
    let ctx = connect_ctx(&invalid);

    let genesis = mine_block([0u8; 32], 1_000_000, vec![coinbase_tx(0, Vec::new())]);
    state.connect_block(&genesis, &ctx).expect("genesis");

    // height 1 mints two ten-coins
    let mint_block = mine_block(
        genesis.header.hash(),
        1_000_060,
        vec![coinbase_tx(
            1,
            vec![
                mint_output(Denomination::Ten, 0xa1),
                mint_output(Denomination::Ten, 0xa2),
            ],
        )],
    );
    let mint_id = state.connect_block(&mint_block, &ctx).expect("mints");
    assert_eq!(state.index.get(mint_id).zc_mints(Denomination::Ten), 2);

    // height 2 spends one of them
    let spend_block = mine_block(
        mint_block.header.hash(),
        1_000_120,
        vec![
            coinbase_tx(2, Vec::new()),
            blind_spend_tx(Denomination::Ten, 777, 9 * COIN),
        ],
    );
    let spend_id = state.connect_block(&spend_block, &ctx).expect("spend");
    assert_eq!(state.index.get(spend_id).zc_mints(Denomination::Ten), 1);
    assert!(state
        .zerocoin()
        .is_serial_confirmed(U256::from(777u64))
        .expect("query"));

    // height 3 reuses the serial: rejected through the persistent index
    let double_spend_block = mine_block(
        spend_block.header.hash(),
        1_000_180,
        vec![
            coinbase_tx(3, Vec::new()),
            blind_spend_tx(Denomination::Ten, 777, 8 * COIN),
        ],
    );
    let failure = state
        .connect_block(&double_spend_block, &ctx)
        .expect_err("double spend");
    assert_eq!(failure.dos_score, 100);
    assert!(matches!(
        failure.error,
        ChainStateError::Zerocoin(ZerocoinError::DoubleSpend)
    ));

    // the failed block left no trace
    assert_eq!(state.active.height(), 2);
    assert_eq!(state.active.tip(), Some(spend_id));

    // a fresh serial connects fine
    let fresh_block = mine_block(
        spend_block.header.hash(),
        1_000_180,
        vec![
            coinbase_tx(3, Vec::new()),
            blind_spend_tx(Denomination::Ten, 778, 8 * COIN),
        ],
    );
    let fresh_id = state.connect_block(&fresh_block, &ctx).expect("fresh serial");
    assert_eq!(state.index.get(fresh_id).zc_mints(Denomination::Ten), 0);
}

#[test]
fn disconnect_releases_serials() {
    let store = Arc::new(MemoryStore::new());
    let mut state = ChainState::new(Arc::clone(&store), test_params());
    let invalid = InvalidOutpoints::new();
    let ctx = connect_ctx(&invalid);

    let genesis = mine_block([0u8; 32], 1_000_000, vec![coinbase_tx(0, Vec::new())]);
    state.connect_block(&genesis, &ctx).expect("genesis");

    let mint_block = mine_block(
        genesis.header.hash(),
        1_000_060,
        vec![coinbase_tx(1, vec![mint_output(Denomination::Fifty, 0xb1)])],
    );
    state.connect_block(&mint_block, &ctx).expect("mint");

    let spend_block = mine_block(
        mint_block.header.hash(),
        1_000_120,
        vec![
            coinbase_tx(2, Vec::new()),
            blind_spend_tx(Denomination::Fifty, 999, 49 * COIN),
        ],
    );
    state.connect_block(&spend_block, &ctx).expect("spend");
    assert!(state
        .zerocoin()
        .is_serial_confirmed(U256::from(999u64))
        .expect("query"));

    state.disconnect_block(&spend_block).expect("disconnect");
    assert_eq!(state.active.height(), 1);
    assert!(!state
        .zerocoin()
        .is_serial_confirmed(U256::from(999u64))
        .expect("query"));

    // the aggregate snapshot rolled back to the mint block's counters
    let (zc_supply, _) = state
        .zerocoin()
        .supply_snapshot()
        .expect("query")
        .expect("snapshot");
    assert_eq!(zc_supply[Denomination::Fifty.index().expect("index")], 1);

    // the same spend connects again afterwards
    state.connect_block(&spend_block, &ctx).expect("reconnect");
    assert_eq!(state.active.height(), 2);
}

#[test]
fn supply_underflow_rejects_the_block() {
    let store = Arc::new(MemoryStore::new());
    let mut state = ChainState::new(Arc::clone(&store), test_params());
    let invalid = InvalidOutpoints::new();
    let ctx = connect_ctx(&invalid);

    let genesis = mine_block([0u8; 32], 1_000_000, vec![coinbase_tx(0, Vec::new())]);
    state.connect_block(&genesis, &ctx).expect("genesis");

    // spend with no prior mint of that denomination
    let rogue_block = mine_block(
        genesis.header.hash(),
        1_000_060,
        vec![
            coinbase_tx(1, Vec::new()),
            blind_spend_tx(Denomination::OneHundred, 555, 99 * COIN),
        ],
    );
    let failure = state
        .connect_block(&rogue_block, &ctx)
        .expect_err("underflow");
    assert!(matches!(
        failure.error,
        ChainStateError::Supply(vitaed_chainstate::SupplyError::SupplyUnderflow(
            Denomination::OneHundred
        ))
    ));
    assert_eq!(state.active.height(), 0);
}

mod public_spends {
    use super::*;
    use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
    use std::collections::HashMap;
    use vitaed_zerocoin::public_spend::{expected_binding, PublicCoinSpend};
    use vitaed_zerocoin::serial::serial_from_pubkey;

    struct MapOutputs {
        map: HashMap<(Hash256, u32), TxOut>,
    }

    impl TxOutSource for MapOutputs {
        fn output(&self, txid: &Hash256, index: u32) -> Option<TxOut> {
            self.map.get(&(*txid, index)).cloned()
        }
    }

    fn public_params() -> ConsensusParams {
        let mut params = test_params();
        params.height_start_zc_public_spends = 2;
        params.height_start_zc_serials_v2 = 2;
        params
    }

    fn signed_public_spend_tx(
        mint_txid: Hash256,
        mint_out: &TxOut,
        payout: i64,
    ) -> (Transaction, U256) {
        let mut bytes = [0u8; 32];
        bytes[31] = 0x11;
        let secret = SecretKey::from_slice(&bytes).expect("secret");
        let secp = Secp256k1::new();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        let pubkey_bytes = pubkey.serialize().to_vec();

        let mut tx = Transaction {
            version: 1,
            vin: Vec::new(),
            vout: vec![TxOut {
                value: payout,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        };

        let mut spend = CoinSpend {
            denomination: Denomination::Fifty,
            ptx_hash: tx.outputs_hash(),
            accumulator_checksum: 0,
            serial: serial_from_pubkey(&pubkey_bytes),
            proof: Vec::new(),
            version: 4,
            pubkey: pubkey_bytes,
            signature: Vec::new(),
            spend_type: SpendType::Spend,
        };
        let message = Message::from_digest_slice(&spend.signature_hash()).expect("digest");
        spend.signature = secp.sign_ecdsa(&message, &secret).serialize_der().to_vec();

        let commitment = vitaed_primitives::script::zerocoin_payload(&mint_out.script_pubkey)
            .expect("mint payload");
        let serial = spend.serial;
        let public = PublicCoinSpend {
            randomness_proof: expected_binding(
                &spend.serial.to_little_endian(),
                commitment,
                &spend.ptx_hash,
            ),
            spend,
            mint_txid,
            mint_index: 1,
        };

        tx.vin.push(TxIn {
            prevout: OutPoint {
                hash: mint_txid,
                index: 1,
            },
            script_sig: public.encode_script_sig(),
            sequence: Denomination::Fifty.value() as u32,
        });
        (tx, serial)
    }

    #[test]
    fn public_spend_connects_and_enforces_version() {
        let store = Arc::new(MemoryStore::new());
        let mut state = ChainState::new(Arc::clone(&store), public_params());
        let invalid = InvalidOutpoints::new();

        let genesis = mine_block([0u8; 32], 1_000_000, vec![coinbase_tx(0, Vec::new())]);
        let mint_tx = coinbase_tx(1, vec![mint_output(Denomination::Fifty, 0xc1)]);
        let mint_txid = mint_tx.txid();
        let mint_out = mint_tx.vout[1].clone();
        let mint_block = mine_block(genesis.header.hash(), 1_000_060, vec![mint_tx]);

        let ctx_outputs = MapOutputs {
            map: HashMap::from([((mint_txid, 1u32), mint_out.clone())]),
        };
        let ctx = ConnectContext {
            resolver: &NoResolver,
            scripts: &AllowAllScripts,
            outputs: &ctx_outputs,
            proofs: &DigestBindingVerifier,
            invalid: &invalid,
        };

        state.connect_block(&genesis, &ctx).expect("genesis");
        state.connect_block(&mint_block, &ctx).expect("mint");

        let (spend_tx, spend_serial) = signed_public_spend_tx(mint_txid, &mint_out, 49 * COIN);
        let spend_block = mine_block(
            mint_block.header.hash(),
            1_000_120,
            vec![coinbase_tx(2, Vec::new()), spend_tx],
        );
        let id = state.connect_block(&spend_block, &ctx).expect("public spend");
        assert_eq!(state.index.get(id).zc_mints(Denomination::Fifty), 0);
        assert!(state
            .zerocoin()
            .is_serial_confirmed(spend_serial)
            .expect("query"));
    }

    #[test]
    fn public_spend_version_mismatch_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut params = public_params();
        // runtime flag rolls the accepted version back to 3
        params.public_spend_v4 = false;
        let mut state = ChainState::new(Arc::clone(&store), params);
        let invalid = InvalidOutpoints::new();

        let genesis = mine_block([0u8; 32], 1_000_000, vec![coinbase_tx(0, Vec::new())]);
        let mint_tx = coinbase_tx(1, vec![mint_output(Denomination::Fifty, 0xc2)]);
        let mint_txid = mint_tx.txid();
        let mint_out = mint_tx.vout[1].clone();
        let mint_block = mine_block(genesis.header.hash(), 1_000_060, vec![mint_tx]);

        let ctx_outputs = MapOutputs {
            map: HashMap::from([((mint_txid, 1u32), mint_out.clone())]),
        };
        let ctx = ConnectContext {
            resolver: &NoResolver,
            scripts: &AllowAllScripts,
            outputs: &ctx_outputs,
            proofs: &DigestBindingVerifier,
            invalid: &invalid,
        };

        state.connect_block(&genesis, &ctx).expect("genesis");
        state.connect_block(&mint_block, &ctx).expect("mint");

        let (spend_tx, _) = signed_public_spend_tx(mint_txid, &mint_out, 49 * COIN);
        let spend_block = mine_block(
            mint_block.header.hash(),
            1_000_120,
            vec![coinbase_tx(2, Vec::new()), spend_tx],
        );
        let failure = state
            .connect_block(&spend_block, &ctx)
            .expect_err("version mismatch");
        assert!(matches!(
            failure.error,
            ChainStateError::Zerocoin(ZerocoinError::ConsensusVersionViolation(_))
        ));
    }
}
