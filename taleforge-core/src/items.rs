//! Inventory items.
//!
//! The model owns the inventory: every turn returns the complete list and it
//! replaces the previous one wholesale. Items here are plain data.

use serde::{Deserialize, Serialize};
use taleforge_macros::Schema;

/// An item carried by the player.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Name of the item
    pub name: String,
    /// What the item looks like and does
    pub description: String,
    /// How rare the item is
    pub rarity: Rarity,
    /// Kind of item
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Whether the player can use the item as an action
    pub usable: bool,
    /// Stat changes the item applies when used or equipped
    #[serde(default)]
    pub effects: Vec<StatEffect>,
}

/// Item rarity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Schema, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Schema, Serialize, Deserialize)]
pub enum ItemType {
    Consumable,
    #[serde(rename = "Quest Item")]
    QuestItem,
    Equipment,
    Tome,
}

/// A signed change to one stat.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
pub struct StatEffect {
    /// The stat affected, such as health, mana or stamina
    pub stat: String,
    /// Signed amount added to the stat
    pub value: i32,
}

impl Item {
    /// Create a common, unusable item with no effects.
    pub fn new(name: impl Into<String>, description: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rarity: Rarity::Common,
            item_type,
            usable: false,
            effects: Vec::new(),
        }
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn usable(mut self) -> Self {
        self.usable = true;
        self
    }

    pub fn with_effect(mut self, stat: impl Into<String>, value: i32) -> Self {
        self.effects.push(StatEffect {
            stat: stat.into(),
            value,
        });
        self
    }

    /// Short human-readable summary of the item's effects, e.g. `+20 health`.
    pub fn effect_summary(&self) -> String {
        self.effects
            .iter()
            .map(|e| format!("{:+} {}", e.value, e.stat))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ItemType {
    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Consumable => "Consumable",
            ItemType::QuestItem => "Quest Item",
            ItemType::Equipment => "Equipment",
            ItemType::Tome => "Tome",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        };
        f.write_str(name)
    }
}
