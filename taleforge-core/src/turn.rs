//! The structured result of one story turn.

use crate::items::Item;
use crate::lore::LoreUpdate;
use crate::quest::{Quest, QuestUpdate};
use serde::{Deserialize, Serialize};
use taleforge_macros::Schema;

/// Everything the model decides in response to one player action.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "record_turn")]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    /// Second-person narration of what happens next, two to four paragraphs
    pub narrative: String,
    /// Lines spoken by characters during this turn, in order
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    /// Where the player is now; repeat the current location if unchanged
    pub new_location: String,
    /// The player's complete inventory after this turn
    pub updated_inventory: Vec<Item>,
    /// The player's current main objective
    pub new_objective: String,
    /// A side quest that begins this turn
    pub new_quest: Option<Quest>,
    /// Progress on an existing side quest
    pub quest_update: Option<QuestUpdate>,
    /// Changes to the player's stats
    pub character_update: Option<CharacterUpdate>,
    /// Places, people or facts the player discovered
    pub lore_update: Option<LoreUpdate>,
    /// A short visual description of the scene, for illustration
    pub scene_description: Option<String>,
    /// Whether the story has ended
    pub is_game_over: bool,
    /// Closing words when the story has ended
    pub game_over_message: Option<String>,
}

/// One spoken line.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Who speaks
    pub speaker: String,
    /// What they say
    pub text: String,
}

/// New stat values reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterUpdate {
    /// New current health
    pub health: Option<i32>,
    /// New current mana
    pub mana: Option<i32>,
    /// New current stamina
    pub stamina: Option<i32>,
    /// Experience earned this turn
    pub xp_gained: Option<i32>,
}

impl TurnResult {
    /// A minimal result that changes nothing but the narrative.
    pub fn narrative_only(
        narrative: impl Into<String>,
        location: impl Into<String>,
        objective: impl Into<String>,
        inventory: Vec<Item>,
    ) -> Self {
        Self {
            narrative: narrative.into(),
            dialogue: Vec::new(),
            new_location: location.into(),
            updated_inventory: inventory,
            new_objective: objective.into(),
            new_quest: None,
            quest_update: None,
            character_update: None,
            lore_update: None,
            scene_description: None,
            is_game_over: false,
            game_over_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_turn() {
        let turn: TurnResult = serde_json::from_str(
            r#"{
                "narrative": "The door creaks open.",
                "newLocation": "Crypt",
                "updatedInventory": [],
                "newObjective": "Find the reliquary",
                "isGameOver": false
            }"#,
        )
        .unwrap();

        assert_eq!(turn.narrative, "The door creaks open.");
        assert!(turn.dialogue.is_empty());
        assert!(turn.quest_update.is_none());
        assert!(turn.lore_update.is_none());
    }

    #[test]
    fn test_parse_full_turn() {
        let turn: TurnResult = serde_json::from_value(serde_json::json!({
            "narrative": "The abbot scowls.",
            "dialogue": [{"speaker": "Abbot Rune", "text": "Leave this place."}],
            "newLocation": "Abbey Gate",
            "updatedInventory": [],
            "newObjective": "Enter the abbey",
            "questUpdate": {"questTitle": "Pilgrim", "completedObjective": "Reach the gate"},
            "characterUpdate": {"stamina": 40, "xpGained": 15},
            "loreUpdate": {"characters": [{"name": "Abbot Rune", "description": "Stern"}]},
            "isGameOver": false
        }))
        .unwrap();

        assert_eq!(turn.dialogue[0].speaker, "Abbot Rune");
        let update = turn.character_update.unwrap();
        assert_eq!(update.stamina, Some(40));
        assert_eq!(update.health, None);
        assert_eq!(update.xp_gained, Some(15));
        assert_eq!(turn.quest_update.unwrap().status, None);
    }
}
