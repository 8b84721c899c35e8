//! The player character and the opening situation.

use crate::items::Item;
use crate::schema::ScenarioOutput;
use serde::{Deserialize, Serialize};
use taleforge_macros::Schema;

/// Experience needed to leave level 1.
pub const STARTING_XP_TO_NEXT_LEVEL: u32 = 100;

/// The player character's sheet.
///
/// Current stats are signed and unclamped: the model may report values
/// outside `0..=max`, and keeping them as given is a presentation concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    pub backstory: String,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub stamina: i32,
    pub max_stamina: i32,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
}

/// The generated part of a new character.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSeed {
    /// The character's name
    pub name: String,
    /// Where they come from and what shaped them, in a short paragraph
    pub backstory: String,
    /// Maximum health, typically 80 to 120
    pub max_health: i32,
    /// Maximum mana, typically 30 to 100 depending on magical aptitude
    pub max_mana: i32,
    /// Maximum stamina, typically 60 to 120
    pub max_stamina: i32,
}

/// Where the story takes place.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Setting {
    /// Name of the starting location
    pub name: String,
    /// What the character sees as the story opens
    pub description: String,
}

/// An accepted scenario: who the player is and why they are here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub character: Character,
    pub setting: Setting,
    pub goal: String,
    pub objective: String,
    #[serde(default)]
    pub starting_inventory: Vec<Item>,
}

impl Character {
    /// A fresh level 1 character at full strength.
    pub fn from_seed(seed: CharacterSeed) -> Self {
        Self {
            name: seed.name,
            backstory: seed.backstory,
            health: seed.max_health,
            max_health: seed.max_health,
            mana: seed.max_mana,
            max_mana: seed.max_mana,
            stamina: seed.max_stamina,
            max_stamina: seed.max_stamina,
            level: 1,
            xp: 0,
            xp_to_next_level: STARTING_XP_TO_NEXT_LEVEL,
        }
    }

    /// Whether accumulated experience has reached the next level.
    pub fn can_level_up(&self) -> bool {
        self.xp >= self.xp_to_next_level
    }
}

impl From<ScenarioOutput> for Scenario {
    fn from(output: ScenarioOutput) -> Self {
        Self {
            character: Character::from_seed(output.character),
            setting: output.setting,
            goal: output.goal,
            objective: output.objective,
            starting_inventory: output.starting_inventory,
        }
    }
}
