//! Schema registry for structured model output.
//!
//! Every generation stage has a static output shape. The shapes are plain
//! Rust types deriving [`Schema`](taleforge_macros::Schema), so the JSON
//! schema sent to the model is produced from the same definitions serde
//! parses the response into.

use crate::items::Item;
use crate::lore::{
    Cosmology, Creature, Era, Faction, HistoricalFigure, Location, MagicSystem, Race, Secret,
};
use crate::scenario::{CharacterSeed, Setting};
use crate::turn::TurnResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taleforge_macros::Schema;

/// How many levels of nested objectives a schema advertises and a parsed
/// quest keeps. Deeper nodes from a misbehaving generator are dropped.
pub const MAX_OBJECTIVE_DEPTH: usize = 4;

/// A type with a JSON schema describing its wire shape.
pub trait OutputSchema {
    /// Tool name under which the schema is offered to the model.
    fn schema_name() -> &'static str;

    /// Free-text description guiding the generator.
    fn schema_description() -> &'static str;

    /// Schema for this type when it sits `depth` levels deep inside a
    /// self-referential shape.
    fn schema_at_depth(depth: usize) -> Value;

    fn output_schema() -> Value {
        Self::schema_at_depth(0)
    }
}

/// One phase of generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Foundation,
    Factions,
    Cosmology,
    MagicSystem,
    Inhabitants,
    FinalDetails,
    Scenario,
    Turn,
}

impl Stage {
    /// World-building stages in the order they must run.
    pub const WORLD: [Stage; 6] = [
        Stage::Foundation,
        Stage::Factions,
        Stage::Cosmology,
        Stage::MagicSystem,
        Stage::Inhabitants,
        Stage::FinalDetails,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Foundation => "World Foundation",
            Stage::Factions => "Factions",
            Stage::Cosmology => "Cosmology",
            Stage::MagicSystem => "Magic System",
            Stage::Inhabitants => "Inhabitants",
            Stage::FinalDetails => "Final Details",
            Stage::Scenario => "Scenario",
            Stage::Turn => "Story Turn",
        }
    }

    /// Tool name the stage's output is requested under.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Stage::Foundation => FoundationOutput::schema_name(),
            Stage::Factions => FactionsOutput::schema_name(),
            Stage::Cosmology => CosmologyOutput::schema_name(),
            Stage::MagicSystem => MagicSystemOutput::schema_name(),
            Stage::Inhabitants => InhabitantsOutput::schema_name(),
            Stage::FinalDetails => FinalDetailsOutput::schema_name(),
            Stage::Scenario => ScenarioOutput::schema_name(),
            Stage::Turn => TurnResult::schema_name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Foundation => FoundationOutput::schema_description(),
            Stage::Factions => FactionsOutput::schema_description(),
            Stage::Cosmology => CosmologyOutput::schema_description(),
            Stage::MagicSystem => MagicSystemOutput::schema_description(),
            Stage::Inhabitants => InhabitantsOutput::schema_description(),
            Stage::FinalDetails => FinalDetailsOutput::schema_description(),
            Stage::Scenario => ScenarioOutput::schema_description(),
            Stage::Turn => TurnResult::schema_description(),
        }
    }

    /// The static output schema for this stage.
    pub fn schema(&self) -> Value {
        match self {
            Stage::Foundation => FoundationOutput::output_schema(),
            Stage::Factions => FactionsOutput::output_schema(),
            Stage::Cosmology => CosmologyOutput::output_schema(),
            Stage::MagicSystem => MagicSystemOutput::output_schema(),
            Stage::Inhabitants => InhabitantsOutput::output_schema(),
            Stage::FinalDetails => FinalDetailsOutput::output_schema(),
            Stage::Scenario => ScenarioOutput::output_schema(),
            Stage::Turn => TurnResult::output_schema(),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Stage outputs
// ============================================================================

/// The foundation of a new fantasy world: its name, core concept and history.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_world_foundation")]
#[serde(rename_all = "camelCase")]
pub struct FoundationOutput {
    /// An evocative name for the world
    pub name: String,
    /// Two or three sentences capturing what makes this world distinctive
    pub core_concept: String,
    /// Three to five eras in chronological order, each caused by the one before it
    pub timeline: Vec<Era>,
}

/// The major factions contending for power in the world.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_factions")]
pub struct FactionsOutput {
    /// Three to five factions with conflicting goals
    pub factions: Vec<Faction>,
}

/// The world's creation myth and pantheon.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_cosmology")]
pub struct CosmologyOutput {
    /// How the world came to be and who watches over it
    pub cosmology: Cosmology,
}

/// How magic works in the world.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_magic_system")]
#[serde(rename_all = "camelCase")]
pub struct MagicSystemOutput {
    /// The single system of magic practiced in the world
    pub magic_system: MagicSystem,
}

/// The peoples, beasts and legends that inhabit the world.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_inhabitants")]
#[serde(rename_all = "camelCase")]
pub struct InhabitantsOutput {
    /// Sapient races
    pub races: Vec<Race>,
    /// Notable creatures and monsters
    pub creatures: Vec<Creature>,
    /// Figures remembered from the world's history
    pub historical_figures: Vec<HistoricalFigure>,
}

/// Notable locations and hidden secrets that complete the world.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_final_details")]
pub struct FinalDetailsOutput {
    /// Places a traveller might visit
    pub locations: Vec<Location>,
    /// Truths hidden from most inhabitants
    pub secrets: Vec<Secret>,
}

/// The player's character and the situation their story opens in.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[schema(name = "create_scenario")]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutput {
    /// The player character
    pub character: CharacterSeed,
    /// Where the story begins
    pub setting: Setting,
    /// The long-term goal driving the character
    pub goal: String,
    /// The first concrete thing the character should do
    pub objective: String,
    /// Two or three modest items the character starts with
    #[serde(default)]
    pub starting_inventory: Vec<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::Objective;

    fn depth_of(schema: &Value) -> usize {
        match schema["properties"].get("subObjectives") {
            Some(sub) => 1 + depth_of(&sub["items"]),
            None => 1,
        }
    }

    #[test]
    fn test_foundation_schema_fields() {
        let schema = Stage::Foundation.schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["coreConcept"]["type"], "string");
        assert_eq!(schema["properties"]["timeline"]["type"], "array");
        assert_eq!(
            schema["properties"]["timeline"]["items"]["properties"]["name"]["type"],
            "string"
        );

        let required = schema["required"].as_array().unwrap();
        for field in ["name", "coreConcept", "timeline"] {
            assert!(required.iter().any(|v| v == field), "{field} should be required");
        }
    }

    #[test]
    fn test_faction_emblem_not_requested() {
        let schema = Stage::Factions.schema();
        let faction = &schema["properties"]["factions"]["items"];
        assert!(faction["properties"].get("emblem").is_none());
        assert!(faction["properties"].get("ideology").is_some());
    }

    #[test]
    fn test_objective_schema_depth_is_bounded() {
        let schema = Objective::output_schema();
        assert_eq!(depth_of(&schema), MAX_OBJECTIVE_DEPTH);

        let required = schema["required"].as_array().unwrap();
        assert!(!required.iter().any(|v| v == "subObjectives"));
    }

    #[test]
    fn test_turn_schema_required_fields() {
        let schema = Stage::Turn.schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        for field in ["narrative", "newLocation", "updatedInventory", "newObjective", "isGameOver"] {
            assert!(required.contains(&field), "{field} should be required");
        }
        for field in ["newQuest", "questUpdate", "characterUpdate", "loreUpdate", "dialogue"] {
            assert!(!required.contains(&field), "{field} should be optional");
        }
    }

    #[test]
    fn test_enum_schemas() {
        let schema = Stage::Turn.schema();
        let item = &schema["properties"]["updatedInventory"]["items"];
        assert_eq!(item["properties"]["type"]["enum"][1], "Quest Item");
        assert_eq!(item["properties"]["rarity"]["enum"][4], "Legendary");

        let quest = &schema["properties"]["newQuest"];
        assert_eq!(quest["properties"]["status"]["enum"][0], "active");
    }

    #[test]
    fn test_world_stages_are_ordered() {
        assert!(Stage::WORLD.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(Stage::WORLD.iter().all(|stage| *stage < Stage::Scenario));
    }

    #[test]
    fn test_tool_names_are_stable() {
        assert_eq!(Stage::Turn.tool_name(), "record_turn");
        assert_eq!(Stage::Scenario.tool_name(), "create_scenario");
        assert!(!Stage::Cosmology.description().is_empty());
    }
}
