//! Semantic verification and state mutation for each transaction kind,
//! executed against a running `Diff` in list order (§4.4.1: "syntactic
//! verify → semantic verify against running diff → apply to running
//! diff"). Any `Err` here aborts the block that is building this diff; the
//! diff itself is discarded by the caller; so these functions mutate the
//! diff directly rather than staging a separate rollback log, mirroring the
//! teacher's transaction-pool validators which likewise bail out of a
//! partially-applied batch by discarding the whole batch.

use ed25519_dalek::VerifyingKey;

use crate::config::VmConfig;
use crate::error::VmError;
use crate::ids::{Id, NodeId};
use crate::staker::{Priority, Staker};
use crate::state::{Diff, StateReader};
use crate::supernet::{Supernet, TransformationParams};
use crate::utxo::{OutPoint, Utxo};

use super::kinds::*;
use super::Transaction;

/// Any leftover between spent inputs and credited outputs is folded into
/// the fee pool, the same "no explicit fee field, unspent input value is
/// the fee" convention the teacher's UTXO model uses.
fn spend_and_credit(
    diff: &mut Diff,
    tx_id: Id,
    base: &BaseTxFields,
    now: i64,
) -> Result<(), VmError> {
    let mut spent = 0u64;
    for input in &base.inputs {
        let utxo = diff
            .get_utxo(&input.outpoint)
            .ok_or_else(|| VmError::NotFound(format!("utxo {:?}", input.outpoint)))?;
        if !utxo.is_spendable_at(now, &input.signers) {
            return Err(VmError::NoSpendableFunds);
        }
        spent = spent
            .checked_add(utxo.amount)
            .ok_or_else(|| VmError::Fatal("utxo amount overflow".into()))?;
        diff.spend_utxo(input.outpoint);
    }

    let mut credited = 0u64;
    for (index, output) in base.outputs.iter().enumerate() {
        diff.put_utxo(Utxo {
            outpoint: OutPoint {
                tx_id,
                output_index: index as u32,
            },
            asset_id: output.asset_id,
            amount: output.amount,
            owner: output.owner.clone(),
            locktime: output.locktime,
            threshold: output.owner.threshold,
        });
        credited = credited
            .checked_add(output.amount)
            .ok_or_else(|| VmError::Fatal("output amount overflow".into()))?;
    }

    let leftover = spent
        .checked_sub(credited)
        .ok_or(VmError::InsufficientFunds {
            needed: credited,
            have: spent,
        })?;
    diff.set_fee_pool(diff.fee_pool().saturating_add(leftover));
    Ok(())
}

fn authorize_supernet(
    diff: &dyn StateReader,
    supernet_id: &Id,
    signers: &[VerifyingKey],
) -> Result<(), VmError> {
    let supernet = diff
        .get_supernet(supernet_id)
        .ok_or_else(|| VmError::NotFound(format!("supernet {supernet_id}")))?;
    if supernet.owner.is_satisfied_by(signers) {
        Ok(())
    } else {
        Err(VmError::Unauthorized(*supernet_id))
    }
}

fn already_staking(diff: &Diff, supernet_id: Id, node_id: NodeId) -> bool {
    let identity = (supernet_id, node_id);
    diff.current_stakers().contains_validator(&identity)
        || diff.pending_stakers().contains_validator(&identity)
}

fn check_validator_bounds(
    start: i64,
    end: i64,
    weight: u64,
    min_stake: u64,
    max_stake: u64,
    min_duration: i64,
    max_duration: i64,
) -> Result<(), VmError> {
    if end <= start {
        return Err(VmError::TxFailed {
            txid: Id::default(),
            reason: "end_time must be after start_time".into(),
        });
    }
    let duration = end - start;
    if duration < min_duration || duration > max_duration {
        return Err(VmError::TxFailed {
            txid: Id::default(),
            reason: format!("stake duration {duration}s outside [{min_duration}, {max_duration}]"),
        });
    }
    if weight < min_stake || weight > max_stake {
        return Err(VmError::TxFailed {
            txid: Id::default(),
            reason: format!("stake weight {weight} outside [{min_stake}, {max_stake}]"),
        });
    }
    Ok(())
}

/// Over-delegation check (§8 scenario 2): the validator's own weight plus
/// every delegator already staked against it, current or pending, must not
/// exceed `max_validator_stake` once the new delegator is admitted. This
/// does not narrow the check to the sub-interval the new delegator
/// actually overlaps — a simplification recorded in DESIGN.md — but it
/// rejects the over-delegation scenario exactly.
fn check_over_delegation(
    diff: &Diff,
    supernet_id: &Id,
    node_id: &NodeId,
    new_weight: u64,
    max_validator_stake: u64,
) -> Result<(), VmError> {
    let existing = diff
        .current_stakers()
        .validator_and_delegator_weight(node_id, supernet_id)
        + diff
            .pending_stakers()
            .validator_and_delegator_weight(node_id, supernet_id);
    let total = existing
        .checked_add(new_weight)
        .ok_or_else(|| VmError::Fatal("stake weight overflow".into()))?;
    if total > max_validator_stake {
        Err(VmError::OverDelegated(*node_id))
    } else {
        Ok(())
    }
}

pub fn execute(
    tx: &Transaction,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    match tx {
        Transaction::AddValidator(t) => apply_add_validator(t, tx_id, diff, cfg, now),
        Transaction::AddDelegator(t) => apply_add_delegator(t, tx_id, diff, cfg, now),
        Transaction::AddSupernetValidator(t) => {
            apply_add_supernet_validator(t, tx_id, diff, cfg, now)
        }
        Transaction::RemoveSupernetValidator(t) => {
            apply_remove_supernet_validator(t, tx_id, diff, now)
        }
        Transaction::AddPermissionlessValidator(t) => {
            apply_add_permissionless_validator(t, tx_id, diff, cfg, now)
        }
        Transaction::AddPermissionlessDelegator(t) => {
            apply_add_permissionless_delegator(t, tx_id, diff, cfg, now)
        }
        Transaction::CreateSupernet(t) => apply_create_supernet(t, tx_id, diff, now),
        Transaction::TransformSupernet(t) => apply_transform_supernet(t, tx_id, diff, now),
        Transaction::TransferSupernetOwnership(t) => {
            apply_transfer_supernet_ownership(t, tx_id, diff, now)
        }
        Transaction::CreateChain(t) => apply_create_chain(t, tx_id, diff, now),
        Transaction::Import(t) => apply_import(t, tx_id, diff, now),
        Transaction::Export(t) => apply_export(t, tx_id, diff, now),
        Transaction::Base(t) => spend_and_credit(diff, tx_id, &t.base, now),
        // RewardValidatorTx and AdvanceTimeTx are only ever valid as the
        // sole transaction of a Proposal/Apricot block respectively; the
        // block executor (`crate::block`) handles them directly instead of
        // dispatching here.
        Transaction::RewardValidator(_) | Transaction::AdvanceTime(_) => Err(VmError::TxFailed {
            txid: tx_id,
            reason: "must be executed by the block, not the generic executor".into(),
        }),
    }
}

fn apply_add_validator(
    tx: &AddValidatorTx,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    let node_id = tx.node_id;
    let supernet_id = crate::ids::PRIMARY_NETWORK_ID;
    if already_staking(diff, supernet_id, node_id) {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "node is already a staker on the primary network".into(),
        });
    }
    check_validator_bounds(
        tx.start_time,
        tx.end_time,
        tx.weight,
        cfg.staking.min_validator_stake,
        cfg.staking.max_validator_stake,
        cfg.staking.min_stake_duration_secs,
        cfg.staking.max_stake_duration_secs,
    )
    .map_err(|_| VmError::TxFailed {
        txid: tx_id,
        reason: "validator stake parameters out of bounds".into(),
    })?;
    if tx.delegation_fee_ppm > cfg.staking.max_delegation_fee_ppm {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "delegation fee exceeds maximum".into(),
        });
    }

    spend_and_credit(diff, tx_id, &tx.base, now)?;

    diff.insert_pending(Staker {
        tx_id,
        node_id,
        supernet_id,
        weight: tx.weight,
        start_time: tx.start_time,
        end_time: tx.end_time,
        potential_reward: 0,
        priority: Priority::PrimaryValidatorPending,
        public_key: Some(tx.public_key),
        delegation_fee_ppm: tx.delegation_fee_ppm,
        reward_owner: Some(tx.reward_owner.clone()),
    });
    Ok(())
}

fn apply_add_delegator(
    tx: &AddDelegatorTx,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    let supernet_id = crate::ids::PRIMARY_NETWORK_ID;
    let identity = (supernet_id, tx.validator_node_id);
    let validator_exists = diff.current_stakers().contains_validator(&identity)
        || diff.pending_stakers().contains_validator(&identity);
    if !validator_exists {
        return Err(VmError::NotFound(format!(
            "validator {}",
            tx.validator_node_id
        )));
    }
    if tx.weight < cfg.staking.min_delegator_stake {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "delegator stake below minimum".into(),
        });
    }
    check_over_delegation(
        diff,
        &supernet_id,
        &tx.validator_node_id,
        tx.weight,
        cfg.staking.max_validator_stake,
    )?;

    spend_and_credit(diff, tx_id, &tx.base, now)?;

    diff.insert_pending(Staker {
        tx_id,
        node_id: tx.validator_node_id,
        supernet_id,
        weight: tx.weight,
        start_time: tx.start_time,
        end_time: tx.end_time,
        potential_reward: 0,
        priority: Priority::PrimaryDelegatorPending,
        public_key: None,
        delegation_fee_ppm: 0,
        reward_owner: Some(tx.reward_owner.clone()),
    });
    Ok(())
}

fn apply_add_supernet_validator(
    tx: &AddSupernetValidatorTx,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    authorize_supernet(&*diff, &tx.supernet_id, &tx.supernet_auth_signers)?;
    if already_staking(diff, tx.supernet_id, tx.node_id) {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "node is already a staker on this supernet".into(),
        });
    }
    check_validator_bounds(
        tx.start_time,
        tx.end_time,
        tx.weight,
        cfg.staking.min_validator_stake,
        cfg.staking.max_validator_stake,
        cfg.staking.min_stake_duration_secs,
        cfg.staking.max_stake_duration_secs,
    )
    .map_err(|_| VmError::TxFailed {
        txid: tx_id,
        reason: "validator stake parameters out of bounds".into(),
    })?;

    spend_and_credit(diff, tx_id, &tx.base, now)?;

    diff.insert_pending(Staker {
        tx_id,
        node_id: tx.node_id,
        supernet_id: tx.supernet_id,
        weight: tx.weight,
        start_time: tx.start_time,
        end_time: tx.end_time,
        potential_reward: 0,
        priority: Priority::SupernetValidatorPending,
        public_key: None,
        delegation_fee_ppm: 0,
        reward_owner: None,
    });
    Ok(())
}

fn apply_remove_supernet_validator(
    tx: &RemoveSupernetValidatorTx,
    tx_id: Id,
    diff: &mut Diff,
    now: i64,
) -> Result<(), VmError> {
    authorize_supernet(&*diff, &tx.supernet_id, &tx.supernet_auth_signers)?;
    let identity = (tx.supernet_id, tx.node_id);
    let pending_tx_id = diff.pending_stakers().validator_tx_id(&identity);
    let current_tx_id = diff.current_stakers().validator_tx_id(&identity);
    if pending_tx_id.is_none() && current_tx_id.is_none() {
        return Err(VmError::NotFound(format!(
            "supernet validator {} on {}",
            tx.node_id, tx.supernet_id
        )));
    }
    spend_and_credit(diff, tx_id, &tx.base, now)?;
    if let Some(validator_tx_id) = pending_tx_id {
        diff.remove_pending(validator_tx_id);
    }
    if let Some(validator_tx_id) = current_tx_id {
        diff.remove_current(validator_tx_id);
    }
    Ok(())
}

fn apply_add_permissionless_validator(
    tx: &AddPermissionlessValidatorTx,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    if already_staking(diff, tx.supernet_id, tx.node_id) {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "node is already a staker on this supernet".into(),
        });
    }
    let (min_stake, max_stake, min_duration, max_duration) =
        validator_bounds_for_supernet(diff, &tx.supernet_id, cfg)?;
    check_validator_bounds(
        tx.start_time,
        tx.end_time,
        tx.weight,
        min_stake,
        max_stake,
        min_duration,
        max_duration,
    )
    .map_err(|_| VmError::TxFailed {
        txid: tx_id,
        reason: "validator stake parameters out of bounds".into(),
    })?;
    if tx.delegation_fee_ppm > cfg.staking.max_delegation_fee_ppm {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "delegation fee exceeds maximum".into(),
        });
    }

    spend_and_credit(diff, tx_id, &tx.base, now)?;

    let priority = if tx.supernet_id.is_primary_network() {
        Priority::PrimaryValidatorPending
    } else {
        Priority::SupernetValidatorPending
    };
    diff.insert_pending(Staker {
        tx_id,
        node_id: tx.node_id,
        supernet_id: tx.supernet_id,
        weight: tx.weight,
        start_time: tx.start_time,
        end_time: tx.end_time,
        potential_reward: 0,
        priority,
        public_key: tx.public_key,
        delegation_fee_ppm: tx.delegation_fee_ppm,
        reward_owner: Some(tx.reward_owner.clone()),
    });
    Ok(())
}

fn apply_add_permissionless_delegator(
    tx: &AddPermissionlessDelegatorTx,
    tx_id: Id,
    diff: &mut Diff,
    cfg: &VmConfig,
    now: i64,
) -> Result<(), VmError> {
    let identity = (tx.supernet_id, tx.validator_node_id);
    let validator_exists = diff.current_stakers().contains_validator(&identity)
        || diff.pending_stakers().contains_validator(&identity);
    if !validator_exists {
        return Err(VmError::NotFound(format!(
            "validator {} on {}",
            tx.validator_node_id, tx.supernet_id
        )));
    }
    let (_, max_stake, _, _) = validator_bounds_for_supernet(diff, &tx.supernet_id, cfg)?;
    if tx.weight < cfg.staking.min_delegator_stake {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "delegator stake below minimum".into(),
        });
    }
    check_over_delegation(diff, &tx.supernet_id, &tx.validator_node_id, tx.weight, max_stake)?;

    spend_and_credit(diff, tx_id, &tx.base, now)?;

    let priority = if tx.supernet_id.is_primary_network() {
        Priority::PrimaryDelegatorPending
    } else {
        // Modeled as a supernet-validator-priority entry: this network
        // only allows delegation against transformed (permissionless)
        // supernets, which share the primary network's tie-break class.
        Priority::SupernetValidatorPending
    };
    diff.insert_pending(Staker {
        tx_id,
        node_id: tx.validator_node_id,
        supernet_id: tx.supernet_id,
        weight: tx.weight,
        start_time: tx.start_time,
        end_time: tx.end_time,
        potential_reward: 0,
        priority,
        public_key: None,
        delegation_fee_ppm: 0,
        reward_owner: Some(tx.reward_owner.clone()),
    });
    Ok(())
}

fn validator_bounds_for_supernet(
    diff: &Diff,
    supernet_id: &Id,
    cfg: &VmConfig,
) -> Result<(u64, u64, i64, i64), VmError> {
    if supernet_id.is_primary_network() {
        return Ok((
            cfg.staking.min_validator_stake,
            cfg.staking.max_validator_stake,
            cfg.staking.min_stake_duration_secs,
            cfg.staking.max_stake_duration_secs,
        ));
    }
    let supernet = diff
        .get_supernet(supernet_id)
        .ok_or_else(|| VmError::NotFound(format!("supernet {supernet_id}")))?;
    let params = supernet
        .transformation
        .as_ref()
        .ok_or_else(|| VmError::TxFailed {
            txid: Id::default(),
            reason: "supernet has not been transformed".into(),
        })?;
    Ok((
        params.min_validator_stake,
        params.max_validator_stake,
        params.min_stake_duration_secs,
        params.max_stake_duration_secs,
    ))
}

fn apply_create_supernet(
    tx: &CreateSupernetTx,
    tx_id: Id,
    diff: &mut Diff,
    now: i64,
) -> Result<(), VmError> {
    spend_and_credit(diff, tx_id, &tx.base, now)?;
    diff.insert_supernet(Supernet {
        supernet_id: tx_id,
        owner: tx.owner.clone(),
        transformation: None,
    });
    Ok(())
}

fn apply_transform_supernet(
    tx: &TransformSupernetTx,
    tx_id: Id,
    diff: &mut Diff,
    now: i64,
) -> Result<(), VmError> {
    authorize_supernet(&*diff, &tx.supernet_id, &tx.supernet_auth_signers)?;
    let mut supernet = diff
        .get_supernet(&tx.supernet_id)
        .cloned()
        .ok_or_else(|| VmError::NotFound(format!("supernet {}", tx.supernet_id)))?;
    if supernet.is_transformed() {
        return Err(VmError::TxFailed {
            txid: tx_id,
            reason: "supernet already transformed".into(),
        });
    }
    spend_and_credit(diff, tx_id, &tx.base, now)?;
    supernet.transformation = Some(TransformationParams {
        transformation_tx: tx_id,
        ..tx.params.clone()
    });
    diff.insert_supernet(supernet);
    let existing = diff.reward_pools().get(&tx.supernet_id).copied().unwrap_or(0);
    diff.set_reward_pool(
        tx.supernet_id,
        existing.saturating_add(tx.initial_reward_pool_deposit),
    );
    Ok(())
}

fn apply_transfer_supernet_ownership(
    tx: &TransferSupernetOwnershipTx,
    tx_id: Id,
    diff: &mut Diff,
    now: i64,
) -> Result<(), VmError> {
    authorize_supernet(&*diff, &tx.supernet_id, &tx.supernet_auth_signers)?;
    let mut supernet = diff
        .get_supernet(&tx.supernet_id)
        .cloned()
        .ok_or_else(|| VmError::NotFound(format!("supernet {}", tx.supernet_id)))?;
    spend_and_credit(diff, tx_id, &tx.base, now)?;
    supernet.owner = tx.new_owner.clone();
    diff.insert_supernet(supernet);
    Ok(())
}

fn apply_create_chain(
    tx: &CreateChainTx,
    tx_id: Id,
    diff: &mut Diff,
    now: i64,
) -> Result<(), VmError> {
    authorize_supernet(&*diff, &tx.supernet_id, &tx.supernet_auth_signers)?;
    spend_and_credit(diff, tx_id, &tx.base, now)?;
    diff.insert_chain(crate::chain_record::ChainRecord {
        chain_id: tx_id,
        supernet_id: tx.supernet_id,
        chain_name: tx.chain_name.clone(),
        vm_id: tx.vm_id,
        genesis_data: tx.genesis_data.clone(),
    });
    Ok(())
}

/// Cross-chain import: resolves each imported input against the VM's own
/// UTXO set the same way a local spend would (§4.4.5's external shared
/// memory collaborator is out of scope per §1; this crate models an
/// import's source as already-materialized UTXOs the diff can see).
fn apply_import(tx: &ImportTx, tx_id: Id, diff: &mut Diff, now: i64) -> Result<(), VmError> {
    let mut combined = tx.base.clone();
    combined.inputs.extend(tx.imported_inputs.iter().cloned());
    spend_and_credit(diff, tx_id, &combined, now)
}

fn apply_export(tx: &ExportTx, tx_id: Id, diff: &mut Diff, now: i64) -> Result<(), VmError> {
    let mut combined = tx.base.clone();
    combined.outputs.extend(tx.exported_outputs.iter().cloned());
    spend_and_credit(diff, tx_id, &combined, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::state::memory_store::MemoryStore;
    use crate::state::StateStore;
    use crate::supernet::OwnerSpec;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    async fn fresh_diff() -> (StateStore, Diff) {
        let store = StateStore::open(Arc::new(MemoryStore::new())).unwrap();
        let diff = store
            .begin_diff(crate::ids::PRIMARY_NETWORK_ID, 1, 1_000)
            .await
            .unwrap();
        (store, diff)
    }

    #[tokio::test]
    async fn add_validator_inserts_pending_staker_and_checks_bounds() {
        let (_store, mut diff) = fresh_diff().await;
        let cfg = VmConfig::testnet();
        let key = SigningKey::generate(&mut OsRng).verifying_key();
        let tx = AddValidatorTx {
            base: BaseTxFields::default(),
            node_id: NodeId([9u8; 20]),
            public_key: key,
            start_time: 1_000,
            end_time: 1_000 + cfg.staking.min_stake_duration_secs + 1,
            weight: cfg.staking.min_validator_stake,
            reward_owner: OwnerSpec::single(key),
            delegation_fee_ppm: 0,
        };
        let tx_id = Id::from_canonical_bytes(b"add-validator");
        apply_add_validator(&tx, tx_id, &mut diff, &cfg, 1_000).unwrap();
        assert!(diff
            .pending_stakers()
            .contains_validator(&(crate::ids::PRIMARY_NETWORK_ID, tx.node_id)));
    }

    #[tokio::test]
    async fn over_delegation_is_rejected() {
        let (_store, mut diff) = fresh_diff().await;
        let cfg = VmConfig::testnet();
        let key = SigningKey::generate(&mut OsRng).verifying_key();
        let node_id = NodeId([3u8; 20]);
        diff.insert_pending(Staker {
            tx_id: Id::from_canonical_bytes(b"validator"),
            node_id,
            supernet_id: crate::ids::PRIMARY_NETWORK_ID,
            weight: cfg.staking.max_validator_stake / 5,
            start_time: 0,
            end_time: 10_000,
            potential_reward: 0,
            priority: Priority::PrimaryValidatorPending,
            public_key: Some(key),
            delegation_fee_ppm: 0,
            reward_owner: Some(OwnerSpec::single(key)),
        });

        let d1 = AddDelegatorTx {
            base: BaseTxFields::default(),
            validator_node_id: node_id,
            start_time: 0,
            end_time: 10_000,
            weight: 4 * cfg.staking.max_validator_stake / 5,
            reward_owner: OwnerSpec::single(key),
        };
        apply_add_delegator(&d1, Id::from_canonical_bytes(b"d1"), &mut diff, &cfg, 0).unwrap();

        let d2 = AddDelegatorTx {
            base: BaseTxFields::default(),
            validator_node_id: node_id,
            start_time: 0,
            end_time: 10_000,
            weight: 1,
            reward_owner: OwnerSpec::single(key),
        };
        let err = apply_add_delegator(&d2, Id::from_canonical_bytes(b"d2"), &mut diff, &cfg, 0)
            .unwrap_err();
        assert!(matches!(err, VmError::OverDelegated(_)));
    }
}
