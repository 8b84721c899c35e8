//! Level-up resolution.
//!
//! Reaching the experience threshold puts the game into a pending level-up
//! state. No action is accepted until the player spends exactly
//! [`LEVEL_UP_POINTS`] points across maximum health, mana and stamina.

use crate::state::GameState;
use thiserror::Error;
use tracing::info;

/// Points granted per level.
pub const LEVEL_UP_POINTS: u32 = 10;

/// Stat units gained per point spent.
pub const UNITS_PER_POINT: i32 = 5;

/// Errors from confirming a level-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelUpError {
    #[error("No level-up is pending")]
    NotPending,

    #[error("{remaining} point(s) left to allocate")]
    Unspent { remaining: u32 },

    #[error("Allocated {spent} points but only {LEVEL_UP_POINTS} are available")]
    Overspent { spent: u32 },
}

/// Points assigned to each maximum stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatAllocation {
    pub health: u32,
    pub mana: u32,
    pub stamina: u32,
}

impl StatAllocation {
    pub fn new(health: u32, mana: u32, stamina: u32) -> Self {
        Self {
            health,
            mana,
            stamina,
        }
    }

    pub fn spent(&self) -> u32 {
        self.health
            .saturating_add(self.mana)
            .saturating_add(self.stamina)
    }

    /// Check the allocation spends the whole budget.
    pub fn validate(&self) -> Result<(), LevelUpError> {
        let spent = self.spent();
        match spent.cmp(&LEVEL_UP_POINTS) {
            std::cmp::Ordering::Less => Err(LevelUpError::Unspent {
                remaining: LEVEL_UP_POINTS - spent,
            }),
            std::cmp::Ordering::Greater => Err(LevelUpError::Overspent { spent }),
            std::cmp::Ordering::Equal => Ok(()),
        }
    }
}

fn units(points: u32) -> i32 {
    i32::try_from(points).unwrap_or(i32::MAX).saturating_mul(UNITS_PER_POINT)
}

impl GameState {
    /// Spend the level-up points and advance one level.
    ///
    /// Experience above the threshold carries over, the next threshold grows
    /// by half (rounded down), and current stats are restored to the new
    /// maxima. If the carried experience still meets the new threshold the
    /// level-up stays pending.
    pub fn confirm_level_up(&self, allocation: StatAllocation) -> Result<GameState, LevelUpError> {
        if !self.pending_level_up {
            return Err(LevelUpError::NotPending);
        }
        allocation.validate()?;

        let mut next = self.clone();
        let character = next.character_mut();

        character.level += 1;
        character.xp = character.xp.saturating_sub(character.xp_to_next_level);
        character.xp_to_next_level = character.xp_to_next_level.saturating_mul(3) / 2;

        character.max_health = character.max_health.saturating_add(units(allocation.health));
        character.max_mana = character.max_mana.saturating_add(units(allocation.mana));
        character.max_stamina = character.max_stamina.saturating_add(units(allocation.stamina));

        character.health = character.max_health;
        character.mana = character.max_mana;
        character.stamina = character.max_stamina;

        info!(level = character.level, xp = character.xp, "level up");
        let still_pending = character.can_level_up();
        next.pending_level_up = still_pending;
        Ok(next)
    }
}
