//! C1 — Reward Calculator.
//!
//! A pure function from `(stake_amount, staked_duration, chain_time,
//! reward_pool_remaining)` to a reward amount, per §4.3. Implemented with
//! `u128` intermediates and `checked_mul`/`checked_div` at every step
//! instead of the source's 256-bit integers (see SPEC_FULL.md's note on
//! integer width) — sufficient headroom for any stake/duration/pool value
//! this network's token economics can produce, and it preserves the
//! "doesn't fit in u64 -> 0" contract bit-for-bit within those ranges.

use crate::config::{RewardScheduleConfig, PERCENT_DENOMINATOR};

/// Inputs to the reward calculation, named the way §4.3 names them.
#[derive(Debug, Clone, Copy)]
pub struct RewardInputs {
    pub stake_amount: u64,
    pub staked_duration_secs: i64,
    /// Chain-time the staker started at, used to resolve where in the
    /// piecewise-linear share schedule this staker's start falls.
    pub stake_start_time: i64,
    pub min_stake_duration_secs: i64,
    pub max_stake_duration_secs: i64,
    pub reward_pool_remaining: Option<u64>,
}

/// Compute the piecewise-linear share (parts-per-million) for `at_time`
/// given the three schedule checkpoints. Clamps to the nearest endpoint
/// share outside `[start, target]`, per §4.3 step 1.
fn schedule_share_ppm(schedule: &RewardScheduleConfig, genesis_time: i64, at_time: i64) -> u64 {
    let start = genesis_time + schedule.start_time_offset_secs;
    let diminishing = genesis_time + schedule.diminishing_time_offset_secs;
    let target = genesis_time + schedule.target_time_offset_secs;

    if at_time <= start {
        return schedule.start_share_ppm;
    }
    if at_time >= target {
        return schedule.target_share_ppm;
    }
    if at_time <= diminishing {
        return interpolate(
            at_time,
            start,
            diminishing,
            schedule.start_share_ppm,
            schedule.diminishing_share_ppm,
        );
    }
    interpolate(
        at_time,
        diminishing,
        target,
        schedule.diminishing_share_ppm,
        schedule.target_share_ppm,
    )
}

fn interpolate(at: i64, from_t: i64, to_t: i64, from_v: u64, to_v: u64) -> u64 {
    if to_t <= from_t {
        return to_v;
    }
    let span = (to_t - from_t) as i128;
    let elapsed = (at - from_t) as i128;
    let delta = to_v as i128 - from_v as i128;
    let interpolated = from_v as i128 + (delta * elapsed) / span;
    interpolated.clamp(0, u64::MAX as i128) as u64
}

/// Stake-period bonus per §4.3 step 2: zero at `min_period`, growing
/// linearly to `stake_period_reward_share_ppm` at `max_period`.
fn stake_period_bonus_ppm(
    schedule: &RewardScheduleConfig,
    duration: i64,
    min_period: i64,
    max_period: i64,
) -> u64 {
    if duration <= min_period || max_period <= min_period {
        return 0;
    }
    let duration = duration.min(max_period);
    let numerator = (duration - min_period) as u128 * schedule.stake_period_reward_share_ppm as u128;
    let denominator = (max_period - min_period) as u128;
    (numerator / denominator) as u64
}

/// Compute the reward per §4.3. `genesis_time` anchors the schedule's
/// `start`/`diminishing`/`target` checkpoints.
pub fn calculate_reward(
    schedule: &RewardScheduleConfig,
    genesis_time: i64,
    inputs: RewardInputs,
) -> u64 {
    let share_ppm = schedule_share_ppm(schedule, genesis_time, inputs.stake_start_time);
    let bonus_ppm = stake_period_bonus_ppm(
        schedule,
        inputs.staked_duration_secs,
        inputs.min_stake_duration_secs,
        inputs.max_stake_duration_secs,
    );

    let combined_ppm = share_ppm as u128 + bonus_ppm as u128;
    let max_period = inputs.max_stake_duration_secs.max(1) as u128;
    let duration = inputs.staked_duration_secs.max(0) as u128;
    let denom = PERCENT_DENOMINATOR as u128 * PERCENT_DENOMINATOR as u128;

    let effective = (|| -> Option<u128> {
        let step1 = combined_ppm.checked_mul(duration)?;
        let step2 = step1.checked_mul(inputs.stake_amount as u128)?;
        step2.checked_div(max_period)?.checked_div(denom)
    })();

    let Some(effective) = effective else {
        return 0;
    };

    let effective: u64 = match u64::try_from(effective) {
        Ok(v) => v,
        Err(_) => return 0,
    };

    match inputs.reward_pool_remaining {
        Some(remaining) => effective.min(remaining),
        None => effective,
    }
}

/// Split `amount` parts-per-million by `delegation_fee_ppm`, returning
/// `(validator_share, delegator_share)`. Used by the Commit option block
/// (§4.4.3) to divide a retiring validator's reward with its delegators.
/// Rounds toward zero, matching §9's "reward-pool accounting rounds toward
/// zero" open question.
pub fn split(amount: u64, delegator_share_ppm: u64) -> (u64, u64) {
    let delegator_share =
        ((amount as u128 * delegator_share_ppm as u128) / PERCENT_DENOMINATOR as u128) as u64;
    (amount - delegator_share, delegator_share)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> RewardScheduleConfig {
        RewardScheduleConfig {
            start_time_offset_secs: 0,
            diminishing_time_offset_secs: 1_000,
            target_time_offset_secs: 2_000,
            start_share_ppm: 200_000,
            diminishing_share_ppm: 100_000,
            target_share_ppm: 100_000,
            stake_period_reward_share_ppm: 50_000,
        }
    }

    #[test]
    fn share_clamps_outside_window() {
        let s = schedule();
        assert_eq!(schedule_share_ppm(&s, 0, -100), 200_000);
        assert_eq!(schedule_share_ppm(&s, 0, 5_000), 100_000);
    }

    #[test]
    fn share_interpolates_linearly() {
        let s = schedule();
        // Halfway between start (200_000) and diminishing (100_000) at t=500.
        assert_eq!(schedule_share_ppm(&s, 0, 500), 150_000);
    }

    #[test]
    fn bonus_is_zero_at_min_period() {
        let s = schedule();
        assert_eq!(stake_period_bonus_ppm(&s, 100, 100, 200), 0);
    }

    #[test]
    fn bonus_is_full_at_max_period() {
        let s = schedule();
        assert_eq!(stake_period_bonus_ppm(&s, 200, 100, 200), 50_000);
    }

    #[test]
    fn reward_never_exceeds_pool() {
        let s = schedule();
        let reward = calculate_reward(
            &s,
            0,
            RewardInputs {
                stake_amount: 1_000_000_000,
                staked_duration_secs: 2_000,
                stake_start_time: 0,
                min_stake_duration_secs: 100,
                max_stake_duration_secs: 2_000,
                reward_pool_remaining: Some(10),
            },
        );
        assert!(reward <= 10);
    }

    #[test]
    fn unbounded_pool_uses_raw_effective_reward() {
        let s = schedule();
        let reward = calculate_reward(
            &s,
            0,
            RewardInputs {
                stake_amount: 2_000 * crate::config::SATOSHIS_PER_TOKEN,
                staked_duration_secs: 2_000,
                stake_start_time: 0,
                min_stake_duration_secs: 100,
                max_stake_duration_secs: 2_000,
                reward_pool_remaining: None,
            },
        );
        assert!(reward > 0);
    }

    #[test]
    fn tiny_pool_can_round_to_zero() {
        // §9 open question: rounding toward zero can leave the last-out
        // staker with nothing. Preserve that behavior rather than "fixing"
        // it with a minimum payout.
        let s = schedule();
        let reward = calculate_reward(
            &s,
            0,
            RewardInputs {
                stake_amount: 1,
                staked_duration_secs: 100,
                stake_start_time: 0,
                min_stake_duration_secs: 100,
                max_stake_duration_secs: 1_000_000,
                reward_pool_remaining: Some(1),
            },
        );
        assert_eq!(reward, 0);
    }

    #[test]
    fn split_is_exact_and_rounds_toward_validator() {
        let (validator, delegator) = split(1_000, 300_000);
        assert_eq!(delegator, 300);
        assert_eq!(validator, 700);
        assert_eq!(validator + delegator, 1_000);
    }
}
