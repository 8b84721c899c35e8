//! World lore.
//!
//! A [`Lore`] is assembled section by section while the world is generated,
//! then shared read-only with gameplay. The only runtime changes are player
//! discoveries, which arrive as a staged [`LoreUpdate`] and are merged into a
//! fresh value so holders of the previous `Arc<Lore>` never see a mutation.

use serde::{Deserialize, Serialize};
use taleforge_macros::Schema;

/// Everything known about the world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lore {
    pub name: String,
    pub core_concept: String,
    pub timeline: Vec<Era>,
    pub factions: Vec<Faction>,
    pub locations: Vec<Location>,
    pub characters: Vec<LoreCharacter>,
    pub knowledge: Vec<String>,
    pub secrets: Vec<Secret>,
    pub cosmology: Cosmology,
    pub magic_system: MagicSystem,
    pub races: Vec<Race>,
    pub creatures: Vec<Creature>,
    pub historical_figures: Vec<HistoricalFigure>,
}

/// An age of the world's history.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Era {
    /// Name of the era
    pub name: String,
    /// What happened, and how it led to the next era
    pub description: String,
}

/// A power group in the world.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Faction {
    /// Name of the faction
    pub name: String,
    /// Who they are and what they want
    pub description: String,
    /// Who leads them
    pub leader: String,
    /// Where they are based
    pub headquarters: String,
    /// The beliefs that bind them
    pub ideology: String,
    /// How they regard the other factions
    pub relationships: String,
    /// Generated emblem image, filled in after creation when available.
    #[schema(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emblem: Option<String>,
}

/// A place in the world.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Location {
    /// Name of the place
    pub name: String,
    /// What a visitor finds there
    pub description: String,
}

/// A person the player has met or heard of.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct LoreCharacter {
    /// The character's name
    pub name: String,
    /// Who they are and why they matter
    pub description: String,
}

/// A hidden truth about the world.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Secret {
    /// Short title of the secret
    pub title: String,
    /// The truth itself
    pub description: String,
}

/// Creation myth and gods.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cosmology {
    /// How the world was made
    pub creation_myth: String,
    /// The gods of the world
    pub deities: Vec<Deity>,
}

/// A god.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Deity {
    /// Name of the deity
    pub name: String,
    /// What the deity holds sway over
    pub domain: String,
    /// Nature and worship of the deity
    pub description: String,
}

/// The rules of magic.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct MagicSystem {
    /// Name of the magic system
    pub name: String,
    /// How magic feels and where it comes from
    pub description: String,
    /// Rules and costs, most fundamental first
    pub rules: Vec<String>,
}

/// A sapient people.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Race {
    /// Name of the race
    pub name: String,
    /// Appearance, culture and homeland
    pub description: String,
}

/// A beast or monster.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct Creature {
    /// Name of the creature
    pub name: String,
    /// Appearance and behaviour
    pub description: String,
    /// Where it can be found
    pub habitat: String,
}

/// Someone remembered by history.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
pub struct HistoricalFigure {
    /// Name of the figure
    pub name: String,
    /// The era they lived in
    pub era: String,
    /// What they are remembered for
    pub description: String,
}

/// Discoveries proposed by a turn, waiting for the player to accept or reject.
#[derive(Debug, Clone, Default, PartialEq, Schema, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreUpdate {
    /// Newly discovered places
    pub locations: Vec<Location>,
    /// Newly met or revealed characters
    pub characters: Vec<LoreCharacter>,
    /// New facts learned about the world
    pub knowledge: Vec<String>,
}

impl LoreUpdate {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.characters.is_empty() && self.knowledge.is_empty()
    }
}

impl Lore {
    /// Look up a faction by exact name.
    pub fn faction(&self, name: &str) -> Option<&Faction> {
        self.factions.iter().find(|f| f.name == name)
    }

    /// A copy of this lore with `update` merged in.
    ///
    /// Locations and characters are de-duplicated by exact name, knowledge by
    /// exact content, both against existing entries and within the update.
    pub fn with_discoveries(&self, update: &LoreUpdate) -> Lore {
        let mut lore = self.clone();

        for location in &update.locations {
            if !lore.locations.iter().any(|l| l.name == location.name) {
                lore.locations.push(location.clone());
            }
        }

        for character in &update.characters {
            if !lore.characters.iter().any(|c| c.name == character.name) {
                lore.characters.push(character.clone());
            }
        }

        for fact in &update.knowledge {
            if !lore.knowledge.contains(fact) {
                lore.knowledge.push(fact.clone());
            }
        }

        lore
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str, description: &str) -> Location {
        Location {
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_discoveries_dedupe_by_exact_name() {
        let lore = Lore {
            locations: vec![place("Emberfall", "A city of kilns")],
            knowledge: vec!["The moon is hollow.".to_string()],
            ..Default::default()
        };

        let update = LoreUpdate {
            locations: vec![
                place("Emberfall", "A different description"),
                place("emberfall", "Case differs, so it is new"),
                place("Saltmarsh", "Tidal flats"),
                place("Saltmarsh", "Repeated within the update"),
            ],
            characters: vec![LoreCharacter {
                name: "Ysolde".to_string(),
                description: "A ferrywoman".to_string(),
            }],
            knowledge: vec![
                "The moon is hollow.".to_string(),
                "Salt wards off the drowned.".to_string(),
            ],
        };

        let merged = lore.with_discoveries(&update);
        let names: Vec<_> = merged.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Emberfall", "emberfall", "Saltmarsh"]);
        assert_eq!(merged.locations[0].description, "A city of kilns");
        assert_eq!(merged.characters.len(), 1);
        assert_eq!(merged.knowledge.len(), 2);

        // The source value is untouched.
        assert_eq!(lore.locations.len(), 1);
    }

    #[test]
    fn test_lore_update_parses_with_missing_sections() {
        let update: LoreUpdate =
            serde_json::from_str(r#"{"knowledge": ["Iron burns the fae."]}"#).unwrap();
        assert!(update.locations.is_empty());
        assert!(!update.is_empty());
        assert!(LoreUpdate::default().is_empty());
    }

    #[test]
    fn test_faction_emblem_is_optional_on_the_wire() {
        let faction: Faction = serde_json::from_value(serde_json::json!({
            "name": "The Ash Court",
            "description": "Exiled nobles",
            "leader": "Queen Maeve",
            "headquarters": "Cinder Keep",
            "ideology": "Restoration",
            "relationships": "Hostile to the Tide Guild"
        }))
        .unwrap();
        assert!(faction.emblem.is_none());
        assert!(serde_json::to_value(&faction).unwrap().get("emblem").is_none());
    }
}
