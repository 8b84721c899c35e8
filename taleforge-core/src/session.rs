//! Game session management.
//!
//! A `GameSession` owns the running [`GameState`] together with the gateway
//! its turns are generated through. Each operation moves the session from
//! one state value to the next.

use crate::assembler::{assemble, TurnError};
use crate::config::GeneratorConfig;
use crate::gateway::{GenerationRequest, ImageGenerator, ModelGateway, PLACEHOLDER_IMAGE};
use crate::level_up::{LevelUpError, StatAllocation};
use crate::prompts;
use crate::reconciler::reconcile;
use crate::state::{ActionRejected, GameState, IllustrationTicket};
use crate::turn::TurnResult;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Errors from GameSession operations.
///
/// Generation failures are not errors here: they end the turn with a
/// [`TurnOutcome::Failed`] and a line in the story.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] ActionRejected),

    #[error(transparent)]
    LevelUp(#[from] LevelUpError),
}

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn was generated and applied.
    Completed {
        narrative: String,
        /// A description of the new scene, when the model offered one.
        scene: Option<String>,
    },
    /// Generation failed. The message was added to the story.
    Failed(String),
}

/// A running game.
pub struct GameSession<G> {
    gateway: G,
    config: GeneratorConfig,
    state: GameState,
}

impl<G: ModelGateway> GameSession<G> {
    pub fn new(gateway: G, config: GeneratorConfig, state: GameState) -> Self {
        Self {
            gateway,
            config,
            state,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Play one turn.
    ///
    /// `on_preview` receives the narrative as it streams in. If generation
    /// fails, the action stays in the story followed by an error line and
    /// nothing else changes.
    #[instrument(skip(self, on_preview))]
    pub async fn player_action<F>(&mut self, action: &str, on_preview: F) -> Result<TurnOutcome, SessionError>
    where
        F: FnMut(&str),
    {
        let action = action.trim();
        self.state = self.state.submit_action(action)?;

        let prompt = prompts::turn(&self.state, action, self.config.history_entries);
        let request = GenerationRequest::new(prompt, &self.config);

        match self.generate_turn(request, on_preview).await {
            Ok(result) => {
                self.state = reconcile(&self.state, &result);
                if self.state.is_game_over {
                    info!("game over");
                }
                Ok(TurnOutcome::Completed {
                    narrative: result.narrative,
                    scene: result.scene_description,
                })
            }
            Err(e) => {
                warn!(error = %e, "turn generation failed");
                let message = format!("The story falters: {e}");
                self.state = self.state.fail_turn(&message);
                Ok(TurnOutcome::Failed(message))
            }
        }
    }

    /// Use an item from the inventory as this turn's action.
    pub async fn use_item<F>(&mut self, name: &str, on_preview: F) -> Result<TurnOutcome, SessionError>
    where
        F: FnMut(&str),
    {
        let action = self.state.use_item_action(name)?;
        self.player_action(&action, on_preview).await
    }

    pub fn accept_lore(&mut self) -> Result<(), SessionError> {
        self.state = self.state.accept_lore()?;
        Ok(())
    }

    pub fn reject_lore(&mut self) -> Result<(), SessionError> {
        self.state = self.state.reject_lore()?;
        Ok(())
    }

    pub fn confirm_level_up(&mut self, allocation: StatAllocation) -> Result<(), SessionError> {
        self.state = self.state.confirm_level_up(allocation)?;
        Ok(())
    }

    /// Add a placeholder for a scene image. Play can continue while the
    /// image is produced.
    pub fn begin_illustration(&mut self, description: &str) -> IllustrationTicket {
        let (state, ticket) = self.state.begin_illustration(description);
        self.state = state;
        ticket
    }

    /// Resolve a placeholder: `Some` fills it, `None` removes it.
    pub fn finish_illustration(&mut self, ticket: IllustrationTicket, image: Option<String>) {
        self.state = self.state.finish_illustration(ticket, image);
    }

    /// Generate and attach a scene image in one step. Returns whether an
    /// image was attached.
    pub async fn illustrate(&mut self, description: &str, images: &dyn ImageGenerator) -> bool {
        let ticket = self.begin_illustration(description);
        let image = match images
            .generate(&prompts::scene(description), PLACEHOLDER_IMAGE)
            .await
        {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "scene image generation failed");
                None
            }
        };
        let attached = image.is_some();
        self.finish_illustration(ticket, image);
        attached
    }

    async fn generate_turn<F>(&self, request: GenerationRequest, on_preview: F) -> Result<TurnResult, TurnError>
    where
        F: FnMut(&str),
    {
        let stream = self.gateway.stream(request).await?;
        assemble(stream, self.config.stream_idle_timeout, on_preview).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Item, ItemType};
    use crate::state::Illustration;
    use crate::testing::{sample_state, sample_turn, split_fragments, MockGateway, MockImages};

    fn session(gateway: &MockGateway) -> GameSession<MockGateway> {
        GameSession::new(gateway.clone(), GeneratorConfig::default(), sample_state())
    }

    #[tokio::test]
    async fn test_turn_streams_and_reconciles() {
        let gateway = MockGateway::new();
        let mut turn = sample_turn("The gulls scatter as you step onto the pier.");
        turn.new_location = "North Pier".to_string();
        gateway.push_turn(&turn, 7);

        let mut session = session(&gateway);
        let mut previews = Vec::new();
        let outcome = session
            .player_action("I walk to the pier", |p| previews.push(p.to_string()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                narrative: turn.narrative.clone(),
                scene: None
            }
        );
        assert!(!previews.is_empty());
        assert_eq!(previews.last().unwrap(), &turn.narrative);
        assert_eq!(session.state().location, "North Pier");
        assert!(!session.state().is_turn_in_flight());

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("I walk to the pier"));
        assert_eq!(requests[0].max_tokens, GeneratorConfig::default().turn_max_tokens);
    }

    #[tokio::test]
    async fn test_truncated_stream_fails_turn() {
        let gateway = MockGateway::new();
        let text = serde_json::to_string(&sample_turn("You find nothing.")).unwrap();
        let truncated = &text[..text.len() / 2];
        gateway.push_fragments(split_fragments(truncated, 5));

        let mut session = session(&gateway);
        let before = session.state().clone();
        let outcome = session.player_action("I search", |_| {}).await.unwrap();

        let TurnOutcome::Failed(message) = outcome else {
            panic!("expected a failed turn");
        };
        let state = session.state();
        assert_eq!(state.last_entry().unwrap().text, message);
        assert_eq!(state.story.len(), before.story.len() + 2);
        assert_eq!(state.inventory, before.inventory);
        assert_eq!(state.location, before.location);
        assert_eq!(state.quests, before.quests);
        assert!(state.gate().is_ok());
    }

    #[tokio::test]
    async fn test_gateway_refusal_fails_turn() {
        let gateway = MockGateway::new();
        gateway.push_stream_failure("rate limited");

        let mut session = session(&gateway);
        let outcome = session.player_action("I wait", |_| {}).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed(m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_rejected_action_leaves_state() {
        let gateway = MockGateway::new();
        let mut session = session(&gateway);
        let err = session.player_action("  ", |_| {}).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(ActionRejected::EmptyAction)));
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn test_logged_action_matches_prompt() {
        let gateway = MockGateway::new();
        gateway.push_turn(&sample_turn("The rope holds."), 9);

        let mut session = session(&gateway);
        session.player_action("  I climb the rigging \n", |_| {}).await.unwrap();

        let story = &session.state().story;
        let action = &story[story.len() - 2];
        assert_eq!(action.text, "I climb the rigging");
        let prompt = &gateway.requests()[0].prompt;
        assert!(prompt.ends_with(&format!("## Player Action\n{}\n", action.text)));
    }

    #[tokio::test]
    async fn test_use_item_submits_action() {
        let gateway = MockGateway::new();
        gateway.push_turn(&sample_turn("The draught warms you."), 3);

        let mut state = sample_state();
        state.inventory.push(Item::new("Warm Draught", "Spiced", ItemType::Consumable).usable());
        let mut session = GameSession::new(gateway.clone(), GeneratorConfig::default(), state);

        session.use_item("Warm Draught", |_| {}).await.unwrap();
        assert!(gateway.requests()[0].prompt.ends_with("I use the Warm Draught.\n"));
    }

    #[tokio::test]
    async fn test_illustrate_failure_removes_placeholder() {
        let gateway = MockGateway::new();
        let mut session = session(&gateway);
        let entries = session.state().story.len();

        let images = MockImages::new();
        images.push_failure("no capacity");
        assert!(!session.illustrate("A lighthouse in fog", &images).await);
        assert_eq!(session.state().story.len(), entries);

        images.push_image("scene.png");
        assert!(session.illustrate("A lighthouse in fog", &images).await);
        assert_eq!(
            session.state().last_entry().unwrap().illustration,
            Some(Illustration::Ready("scene.png".to_string()))
        );
    }
}
