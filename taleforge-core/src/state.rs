//! Game state and its submission gates.
//!
//! `GameState` is a value. Every transition (`submit_action`, `reconcile`,
//! `fail_turn`, `accept_lore`, `confirm_level_up`, ...) takes the current
//! state by reference and returns the next one, so a caller can keep or
//! discard either side freely.

use crate::items::Item;
use crate::lore::{Lore, LoreUpdate};
use crate::quest::Quest;
use crate::scenario::{Character, Scenario};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Why an action or decision was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    #[error("The story has ended")]
    GameOver,

    #[error("The previous turn is still being written")]
    TurnInFlight,

    #[error("Allocate your level-up points first")]
    LevelUpPending,

    #[error("Accept or reject the new lore first")]
    LoreDecisionPending,

    #[error("No lore update is waiting for a decision")]
    NoLoreUpdate,

    #[error("You are not carrying '{0}'")]
    UnknownItem(String),

    #[error("'{0}' cannot be used")]
    ItemNotUsable(String),

    #[error("Say what you want to do")]
    EmptyAction,
}

/// Unique id of a story entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who a story entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Player,
    Narrator,
    Character(String),
}

/// State of an image attached to a story entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Illustration {
    Pending,
    Ready(String),
}

/// One line of the story log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEntry {
    pub id: EntryId,
    pub speaker: Speaker,
    pub text: String,
    pub illustration: Option<Illustration>,
}

impl StoryEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: EntryId::new(),
            speaker,
            text: text.into(),
            illustration: None,
        }
    }

    pub fn player(text: impl Into<String>) -> Self {
        Self::new(Speaker::Player, text)
    }

    pub fn narrator(text: impl Into<String>) -> Self {
        Self::new(Speaker::Narrator, text)
    }

    pub fn dialogue(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Speaker::Character(speaker.into()), text)
    }

    /// Name of the speaking character, for dialogue entries.
    pub fn speaker_name(&self) -> Option<&str> {
        match &self.speaker {
            Speaker::Character(name) => Some(name),
            _ => None,
        }
    }
}

/// Handle for a pending scene illustration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllustrationTicket(pub(crate) EntryId);

/// The whole state of a running game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// World lore, shared with the presentation layer.
    pub lore: Arc<Lore>,
    pub scenario: Scenario,
    pub inventory: Vec<Item>,
    pub location: String,
    pub story: Vec<StoryEntry>,
    pub objective: String,
    pub quests: Vec<Quest>,
    pub is_game_over: bool,
    pub game_over_message: Option<String>,
    pub(crate) turn_in_flight: bool,
    pub(crate) pending_level_up: bool,
    pub(crate) pending_lore: Option<LoreUpdate>,
}

impl GameState {
    /// Start a game from accepted lore and scenario.
    pub fn new(lore: Arc<Lore>, scenario: Scenario) -> Self {
        let opening = StoryEntry::narrator(scenario.setting.description.clone());
        Self {
            lore,
            inventory: scenario.starting_inventory.clone(),
            location: scenario.setting.name.clone(),
            objective: scenario.objective.clone(),
            story: vec![opening],
            quests: Vec::new(),
            scenario,
            is_game_over: false,
            game_over_message: None,
            turn_in_flight: false,
            pending_level_up: false,
            pending_lore: None,
        }
    }

    pub fn lore(&self) -> &Arc<Lore> {
        &self.lore
    }

    pub fn character(&self) -> &Character {
        &self.scenario.character
    }

    pub fn character_mut(&mut self) -> &mut Character {
        &mut self.scenario.character
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight
    }

    pub fn is_level_up_pending(&self) -> bool {
        self.pending_level_up
    }

    pub fn pending_lore(&self) -> Option<&LoreUpdate> {
        self.pending_lore.as_ref()
    }

    pub fn quest(&self, title: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.title == title)
    }

    pub fn last_entry(&self) -> Option<&StoryEntry> {
        self.story.last()
    }

    /// The last `count` entries of the story, oldest first.
    pub fn recent_story(&self, count: usize) -> &[StoryEntry] {
        let start = self.story.len().saturating_sub(count);
        &self.story[start..]
    }

    /// Check whether a new action may be submitted.
    pub fn gate(&self) -> Result<(), ActionRejected> {
        if self.is_game_over {
            Err(ActionRejected::GameOver)
        } else if self.turn_in_flight {
            Err(ActionRejected::TurnInFlight)
        } else if self.pending_level_up {
            Err(ActionRejected::LevelUpPending)
        } else if self.pending_lore.is_some() {
            Err(ActionRejected::LoreDecisionPending)
        } else {
            Ok(())
        }
    }

    /// Record the player's action and mark a turn as in flight.
    pub fn submit_action(&self, action: &str) -> Result<GameState, ActionRejected> {
        self.gate()?;
        let action = action.trim();
        if action.is_empty() {
            return Err(ActionRejected::EmptyAction);
        }

        let mut next = self.clone();
        next.story.push(StoryEntry::player(action));
        next.turn_in_flight = true;
        Ok(next)
    }

    /// The action text for using an item, if the item may be used now.
    pub fn use_item_action(&self, name: &str) -> Result<String, ActionRejected> {
        self.gate()?;
        let item = self
            .inventory
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ActionRejected::UnknownItem(name.to_string()))?;
        if !item.usable {
            return Err(ActionRejected::ItemNotUsable(name.to_string()));
        }
        Ok(format!("I use the {}.", item.name))
    }

    /// Abandon the in-flight turn, logging `message` in place of narrative.
    pub fn fail_turn(&self, message: &str) -> GameState {
        let mut next = self.clone();
        next.story.push(StoryEntry::narrator(message));
        next.turn_in_flight = false;
        next
    }

    /// Merge the staged lore update into a new `Lore`.
    pub fn accept_lore(&self) -> Result<GameState, ActionRejected> {
        let update = self.pending_lore.as_ref().ok_or(ActionRejected::NoLoreUpdate)?;
        let mut next = self.clone();
        next.lore = Arc::new(self.lore.with_discoveries(update));
        next.pending_lore = None;
        Ok(next)
    }

    /// Discard the staged lore update, leaving lore untouched.
    pub fn reject_lore(&self) -> Result<GameState, ActionRejected> {
        if self.pending_lore.is_none() {
            return Err(ActionRejected::NoLoreUpdate);
        }
        let mut next = self.clone();
        next.pending_lore = None;
        Ok(next)
    }

    /// Append a placeholder entry for a scene image.
    pub fn begin_illustration(&self, description: &str) -> (GameState, IllustrationTicket) {
        let mut entry = StoryEntry::narrator(description);
        entry.illustration = Some(Illustration::Pending);
        let ticket = IllustrationTicket(entry.id);

        let mut next = self.clone();
        next.story.push(entry);
        (next, ticket)
    }

    /// Fill the placeholder with the image, or remove it when generation
    /// failed. A ticket whose entry is gone is ignored.
    pub fn finish_illustration(&self, ticket: IllustrationTicket, image: Option<String>) -> GameState {
        let mut next = self.clone();
        match image {
            Some(image) => {
                if let Some(entry) = next.story.iter_mut().find(|e| e.id == ticket.0) {
                    entry.illustration = Some(Illustration::Ready(image));
                }
            }
            None => next.story.retain(|e| e.id != ticket.0),
        }
        next
    }
}
