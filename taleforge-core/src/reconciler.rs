//! Applies a parsed turn result to the game state.

use crate::state::{GameState, StoryEntry};
use crate::turn::TurnResult;
use tracing::{debug, info};

/// Produce the state that follows `state` once `result` is applied.
///
/// The player's action is already in the log (see
/// [`GameState::submit_action`]); this appends the narrative and dialogue
/// after it. Lore discoveries are staged, never merged here.
pub fn reconcile(state: &GameState, result: &TurnResult) -> GameState {
    let mut next = state.clone();
    next.turn_in_flight = false;

    next.story.push(StoryEntry::narrator(result.narrative.clone()));
    for line in &result.dialogue {
        next.story
            .push(StoryEntry::dialogue(line.speaker.clone(), line.text.clone()));
    }

    next.location = result.new_location.clone();
    next.inventory = result.updated_inventory.clone();
    next.objective = result.new_objective.clone();

    if let Some(quest) = &result.new_quest {
        let mut quest = quest.clone();
        quest.status = crate::quest::QuestStatus::Active;
        quest.enforce_depth_limit();
        info!(title = %quest.title, objectives = quest.objective_count(), "new quest");
        next.quests.push(quest);
    }

    if let Some(update) = &result.quest_update {
        match next.quests.iter_mut().find(|q| q.title == update.quest_title) {
            Some(quest) => {
                if quest.apply_update(update) {
                    debug!(title = %quest.title, status = %quest.status, "quest updated");
                }
            }
            None => debug!(title = %update.quest_title, "quest update names no known quest"),
        }
    }

    if let Some(update) = &result.character_update {
        let character = next.character_mut();
        if let Some(health) = update.health {
            character.health = health;
        }
        if let Some(mana) = update.mana {
            character.mana = mana;
        }
        if let Some(stamina) = update.stamina {
            character.stamina = stamina;
        }
        if let Some(gained) = update.xp_gained.filter(|xp| *xp > 0) {
            character.xp = character.xp.saturating_add(gained.unsigned_abs());
        }
        if character.can_level_up() {
            next.pending_level_up = true;
        }
    }

    if let Some(update) = &result.lore_update {
        if !update.is_empty() {
            next.pending_lore = Some(update.clone());
        }
    }

    next.is_game_over = result.is_game_over;
    next.game_over_message = result.game_over_message.clone();

    next
}
