//! Interactive fiction engine driven by a generative model.
//!
//! This crate provides:
//! - Staged world generation with schema-constrained model output
//! - Streamed story turns with a live narrative preview
//! - A pure reconciler that applies each turn to the game state
//! - Quests with nested objectives, level-ups and lore discoveries
//!
//! # Quick Start
//!
//! ```ignore
//! use taleforge_core::{ClaudeGateway, GeneratorConfig, WorldBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::from_env()?;
//!     let gateway = ClaudeGateway::from_config(&config)?;
//!
//!     let mut world = WorldBuilder::new(gateway, config);
//!     world.foundation(Some("a city on the back of a turtle")).await?;
//!     while let Some(stage) = world.next_stage() {
//!         world.run_stage(stage, None).await?;
//!     }
//!
//!     let scenario = world.scenario(None).await?;
//!     let mut session = world.into_session(scenario);
//!     session.player_action("I look around", |preview| print!("\r{preview}")).await?;
//!     Ok(())
//! }
//! ```

extern crate self as taleforge_core;

pub mod assembler;
pub mod config;
pub mod gateway;
pub mod items;
pub mod level_up;
pub mod lore;
pub mod prompts;
pub mod quest;
pub mod reconciler;
pub mod scenario;
pub mod schema;
pub mod session;
pub mod state;
pub mod testing;
pub mod turn;
pub mod world;

// Re-export for convenience
pub use taleforge_macros::Schema;

// Primary public API
pub use assembler::{assemble, extract_narrative_preview, TurnAssembler, TurnError};
pub use config::{ConfigError, GeneratorConfig};
pub use gateway::{ClaudeGateway, GatewayError, ImageGenerator, ModelGateway, NoImages};
pub use level_up::{LevelUpError, StatAllocation};
pub use reconciler::reconcile;
pub use schema::{OutputSchema, Stage};
pub use session::{GameSession, SessionError, TurnOutcome};
pub use state::{ActionRejected, GameState, Speaker, StoryEntry};
pub use testing::{MockGateway, MockImages, TestHarness};
pub use turn::TurnResult;
pub use world::{BuildError, WorldBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// A signpost at a crossroads
    #[derive(Schema, Deserialize)]
    #[schema(name = "read_signpost")]
    #[serde(rename_all = "camelCase")]
    struct Signpost {
        /// Where the left road leads
        left_road: String,
        /// Where the right road leads, if anywhere
        right_road: Option<String>,
    }

    #[test]
    fn test_schema_derive() {
        assert_eq!(Signpost::schema_name(), "read_signpost");
        assert_eq!(Signpost::schema_description(), "A signpost at a crossroads");
    }

    #[test]
    fn test_schema_fields() {
        let schema = Signpost::output_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["leftRoad"]["type"], "string");
        assert_eq!(
            schema["properties"]["leftRoad"]["description"],
            "Where the left road leads"
        );

        // leftRoad is required, rightRoad is not (it's Option)
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "leftRoad"));
        assert!(!required.iter().any(|v| v == "rightRoad"));
    }
}
