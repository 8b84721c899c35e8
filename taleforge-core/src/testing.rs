//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockGateway` and `MockImages` for deterministic runs without API calls
//! - Sample lore, scenario and state fixtures
//! - `TestHarness` for scripted play-throughs
//! - Assertion helpers for verifying game state

use crate::config::GeneratorConfig;
use crate::gateway::{FragmentStream, GatewayError, GenerationRequest, ImageGenerator, ModelGateway};
use crate::items::{Item, ItemType};
use crate::lore::{
    Cosmology, Creature, Deity, Era, Faction, HistoricalFigure, Location, Lore, LoreCharacter,
    MagicSystem, Race, Secret,
};
use crate::quest::QuestStatus;
use crate::scenario::{Character, CharacterSeed, Scenario, Setting};
use crate::schema::Stage;
use crate::session::{GameSession, SessionError, TurnOutcome};
use crate::state::{GameState, Speaker};
use crate::turn::TurnResult;
use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Mock gateway
// ============================================================================

#[derive(Debug)]
enum ScriptedStream {
    Fragments(Vec<String>),
    /// Yields the fragments, then fails.
    Broken(Vec<String>, String),
    /// The stream cannot be opened at all.
    Refused(String),
}

#[derive(Debug, Default)]
struct GatewayScript {
    responses: VecDeque<Result<Value, String>>,
    streams: VecDeque<ScriptedStream>,
    requests: Vec<GenerationRequest>,
}

/// A gateway that replays scripted responses.
///
/// Clones share one script, so a test can keep a handle for scripting and
/// inspection after moving the gateway into a builder or session.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    script: Arc<Mutex<GatewayScript>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, GatewayScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a document for the next `generate` call.
    pub fn push_response(&self, value: Value) {
        self.script().responses.push_back(Ok(value));
    }

    /// Make the next `generate` call fail.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script().responses.push_back(Err(message.into()));
    }

    /// Queue fragments for the next `stream` call.
    pub fn push_fragments<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.script().streams.push_back(ScriptedStream::Fragments(fragments));
    }

    /// Queue a complete turn, split into fragments of `chunk` characters.
    pub fn push_turn(&self, turn: &TurnResult, chunk: usize) {
        let text = serde_json::to_string(turn).expect("turn serializes");
        self.push_fragments(split_fragments(&text, chunk));
    }

    /// Queue a stream that yields `fragments` and then fails.
    pub fn push_broken_stream<I, S>(&self, fragments: I, message: impl Into<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.script()
            .streams
            .push_back(ScriptedStream::Broken(fragments, message.into()));
    }

    /// Make the next `stream` call fail before yielding anything.
    pub fn push_stream_failure(&self, message: impl Into<String>) {
        self.script()
            .streams
            .push_back(ScriptedStream::Refused(message.into()));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.script().requests.clone()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GatewayError> {
        let mut script = self.script();
        script.requests.push(request);
        match script.responses.pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(GatewayError::Service(message)),
            None => Err(GatewayError::Unavailable("no scripted response".to_string())),
        }
    }

    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GatewayError> {
        let mut script = self.script();
        script.requests.push(request);
        match script.streams.pop_front() {
            Some(ScriptedStream::Fragments(fragments)) => {
                Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
            }
            Some(ScriptedStream::Broken(fragments, message)) => {
                let items = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(GatewayError::Service(message))));
                Ok(Box::pin(stream::iter(items)))
            }
            Some(ScriptedStream::Refused(message)) => Err(GatewayError::Service(message)),
            None => Err(GatewayError::Unavailable("no scripted stream".to_string())),
        }
    }
}

/// Split `text` into pieces of at most `chunk` characters.
pub fn split_fragments(text: &str, chunk: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

// ============================================================================
// Mock images
// ============================================================================

#[derive(Debug, Default)]
struct ImageScript {
    results: VecDeque<Result<String, String>>,
    prompts: Vec<String>,
}

/// An image generator that replays scripted results.
#[derive(Debug, Clone, Default)]
pub struct MockImages {
    script: Arc<Mutex<ImageScript>>,
}

impl MockImages {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, ImageScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_image(&self, image: impl Into<String>) {
        self.script().results.push_back(Ok(image.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.script().results.push_back(Err(message.into()));
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.script().prompts.clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImages {
    async fn generate(&self, prompt: &str, _placeholder: &str) -> Result<String, GatewayError> {
        let mut script = self.script();
        script.prompts.push(prompt.to_string());
        match script.results.pop_front() {
            Some(Ok(image)) => Ok(image),
            Some(Err(message)) => Err(GatewayError::Service(message)),
            None => Err(GatewayError::Unavailable("no scripted image".to_string())),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A small, complete world.
pub fn sample_lore() -> Lore {
    Lore {
        name: "Brinehollow".to_string(),
        core_concept: "A drowned archipelago where the tide hides a second city.".to_string(),
        timeline: vec![
            Era {
                name: "The Dry Age".to_string(),
                description: "The islands were one land until the sea-gods quarrelled.".to_string(),
            },
            Era {
                name: "The Drowning".to_string(),
                description: "The sea rose in a night and the old capital sank.".to_string(),
            },
        ],
        factions: vec![
            Faction {
                name: "Salt Wardens".to_string(),
                description: "Keepers of the sea walls.".to_string(),
                leader: "Warden Oska".to_string(),
                headquarters: "The Breakwater".to_string(),
                ideology: "The sea must be held back at any cost.".to_string(),
                relationships: "Distrust the Lantern Guild.".to_string(),
                emblem: None,
            },
            Faction {
                name: "Lantern Guild".to_string(),
                description: "Divers who loot the sunken capital.".to_string(),
                leader: "Mother Vey".to_string(),
                headquarters: "The Bell Tower".to_string(),
                ideology: "What the sea took can be taken back.".to_string(),
                relationships: "Bribe the Salt Wardens when they can.".to_string(),
                emblem: None,
            },
        ],
        locations: vec![Location {
            name: "Gull Market".to_string(),
            description: "A floating bazaar lashed from old hulls.".to_string(),
        }],
        characters: vec![LoreCharacter {
            name: "Warden Oska".to_string(),
            description: "A scarred veteran of the walls.".to_string(),
        }],
        knowledge: vec!["The tide is lowest at the new moon.".to_string()],
        secrets: vec![Secret {
            title: "The Living City".to_string(),
            description: "The sunken capital is still inhabited.".to_string(),
        }],
        cosmology: Cosmology {
            creation_myth: "Two sisters, Sea and Stone, made the world and then fought over it."
                .to_string(),
            deities: vec![Deity {
                name: "Maru".to_string(),
                domain: "The tide".to_string(),
                description: "Worshipped with offerings of salt.".to_string(),
            }],
        },
        magic_system: MagicSystem {
            name: "Tidecalling".to_string(),
            description: "Magic drawn from the pull of the moon on water.".to_string(),
            rules: vec!["Every spell costs the caster a memory.".to_string()],
        },
        races: vec![Race {
            name: "Merrow".to_string(),
            description: "Gilled folk who live between the tides.".to_string(),
        }],
        creatures: vec![Creature {
            name: "Bell Eel".to_string(),
            description: "An eel whose call sounds like a church bell.".to_string(),
            habitat: "The sunken capital".to_string(),
        }],
        historical_figures: vec![HistoricalFigure {
            name: "Queen Ilse".to_string(),
            era: "The Drowning".to_string(),
            description: "Refused to leave her throne as the water rose.".to_string(),
        }],
    }
}

pub fn sample_scenario() -> Scenario {
    Scenario {
        character: Character::from_seed(CharacterSeed {
            name: "Nell Tarrow".to_string(),
            backstory: "A dock runner who owes the Lantern Guild a debt.".to_string(),
            max_health: 100,
            max_mana: 40,
            max_stamina: 80,
        }),
        setting: Setting {
            name: "Gull Market".to_string(),
            description: "Rain drums on the canvas awnings of Gull Market.".to_string(),
        },
        goal: "Pay off the debt and leave Brinehollow.".to_string(),
        objective: "Find work before nightfall.".to_string(),
        starting_inventory: vec![Item::new("Boathook", "Long and rusted", ItemType::Equipment)],
    }
}

/// A fresh game in the sample world.
pub fn sample_state() -> GameState {
    GameState::new(Arc::new(sample_lore()), sample_scenario())
}

/// A turn that keeps the sample state's location, objective and inventory.
pub fn sample_turn(narrative: &str) -> TurnResult {
    let scenario = sample_scenario();
    TurnResult::narrative_only(
        narrative,
        scenario.setting.name,
        scenario.objective,
        scenario.starting_inventory,
    )
}

/// A well-formed `generate` document for `stage`, drawn from the sample world.
pub fn stage_output(stage: Stage) -> Value {
    let lore = sample_lore();
    match stage {
        Stage::Foundation => json!({
            "name": lore.name,
            "coreConcept": lore.core_concept,
            "timeline": lore.timeline,
        }),
        Stage::Factions => json!({ "factions": lore.factions }),
        Stage::Cosmology => json!({ "cosmology": lore.cosmology }),
        Stage::MagicSystem => json!({ "magicSystem": lore.magic_system }),
        Stage::Inhabitants => json!({
            "races": lore.races,
            "creatures": lore.creatures,
            "historicalFigures": lore.historical_figures,
        }),
        Stage::FinalDetails => json!({
            "locations": lore.locations,
            "secrets": lore.secrets,
        }),
        Stage::Scenario => json!({
            "character": {
                "name": "Nell Tarrow",
                "backstory": "A dock runner who owes the Lantern Guild a debt.",
                "maxHealth": 100,
                "maxMana": 40,
                "maxStamina": 80
            },
            "setting": {
                "name": "Gull Market",
                "description": "Rain drums on the canvas awnings of Gull Market."
            },
            "goal": "Pay off the debt and leave Brinehollow.",
            "objective": "Find work before nightfall.",
            "startingInventory": [{
                "name": "Boathook",
                "description": "Long and rusted",
                "rarity": "Common",
                "type": "Equipment",
                "usable": false
            }]
        }),
        Stage::Turn => json!(sample_turn("The tide turns.")),
    }
}

// ============================================================================
// Test harness
// ============================================================================

/// Test harness for running scripted play-throughs.
pub struct TestHarness {
    /// Handle on the session's gateway, for scripting turns.
    pub gateway: MockGateway,
    /// The session under test.
    pub session: GameSession<MockGateway>,
    /// Every preview reported during the last turn.
    pub previews: Vec<String>,
}

impl TestHarness {
    /// A harness around a fresh game in the sample world.
    pub fn new() -> Self {
        Self::with_state(sample_state())
    }

    pub fn with_state(state: GameState) -> Self {
        let gateway = MockGateway::new();
        let session = GameSession::new(gateway.clone(), GeneratorConfig::default(), state);
        Self {
            gateway,
            session,
            previews: Vec::new(),
        }
    }

    /// Script the next turn.
    pub fn expect_turn(&mut self, turn: &TurnResult) -> &mut Self {
        self.gateway.push_turn(turn, 16);
        self
    }

    /// Script the next turn as raw fragments.
    pub fn expect_fragments(&mut self, fragments: &[&str]) -> &mut Self {
        self.gateway.push_fragments(fragments.iter().copied());
        self
    }

    /// Play a turn, collecting its previews.
    pub async fn act(&mut self, action: &str) -> Result<TurnOutcome, SessionError> {
        let mut previews = Vec::new();
        let outcome = self
            .session
            .player_action(action, |p| previews.push(p.to_string()))
            .await;
        self.previews = previews;
        outcome
    }

    pub fn state(&self) -> &GameState {
        self.session.state()
    }

    /// Text of the last story entry.
    pub fn last_text(&self) -> Option<&str> {
        self.state().last_entry().map(|e| e.text.as_str())
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.state().inventory.iter().any(|i| i.name == name)
    }

    /// Speakers of the last `count` story entries, oldest first.
    pub fn recent_speakers(&self, count: usize) -> Vec<Speaker> {
        self.state()
            .recent_story(count)
            .iter()
            .map(|e| e.speaker.clone())
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert that the player carries an item.
#[track_caller]
pub fn assert_has_item(harness: &TestHarness, name: &str) {
    assert!(harness.has_item(name), "Expected item '{name}' in inventory");
}

/// Assert that the player does not carry an item.
#[track_caller]
pub fn assert_no_item(harness: &TestHarness, name: &str) {
    assert!(!harness.has_item(name), "Expected no item '{name}' in inventory");
}

/// Assert the player's current location.
#[track_caller]
pub fn assert_location(harness: &TestHarness, location: &str) {
    assert_eq!(harness.state().location, location, "Unexpected location");
}

/// Assert a quest's status.
#[track_caller]
pub fn assert_quest_status(harness: &TestHarness, title: &str, status: QuestStatus) {
    let quest = harness
        .state()
        .quest(title)
        .unwrap_or_else(|| panic!("Expected quest '{title}'"));
    assert_eq!(quest.status, status, "Unexpected status for quest '{title}'");
}

/// Assert current and maximum health.
#[track_caller]
pub fn assert_health(harness: &TestHarness, current: i32, max: i32) {
    let character = harness.state().character();
    assert_eq!(
        (character.health, character.max_health),
        (current, max),
        "Expected health {current}/{max}"
    );
}

/// Assert the player's level.
#[track_caller]
pub fn assert_level(harness: &TestHarness, level: u32) {
    assert_eq!(harness.state().character().level, level, "Unexpected level");
}
