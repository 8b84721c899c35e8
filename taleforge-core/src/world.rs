//! Staged world generation.
//!
//! A [`WorldBuilder`] drives the wizard that turns a seed idea into a
//! [`Lore`]: foundation, factions, cosmology, magic system, inhabitants and
//! final details, each generated from everything before it. Once the world
//! is complete a scenario is generated and the builder hands over to a game.

use crate::config::GeneratorConfig;
use crate::gateway::{GatewayError, GenerationRequest, ImageGenerator, ModelGateway, PLACEHOLDER_IMAGE};
use crate::lore::Lore;
use crate::prompts::{self, Prompt};
use crate::scenario::Scenario;
use crate::schema::{
    CosmologyOutput, FactionsOutput, FinalDetailsOutput, FoundationOutput, InhabitantsOutput,
    MagicSystemOutput, ScenarioOutput, Stage,
};
use crate::session::GameSession;
use crate::state::GameState;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Errors from a world-building stage.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GatewayError),

    #[error("{stage} needs {missing} to be generated first")]
    OutOfOrder { stage: Stage, missing: Stage },

    #[error("{stage} output was not understood: {message}")]
    Malformed { stage: Stage, message: String },
}

/// Builds a world one stage at a time.
pub struct WorldBuilder<G> {
    gateway: G,
    config: GeneratorConfig,
    lore: Lore,
    completed: BTreeSet<Stage>,
}

impl<G: ModelGateway> WorldBuilder<G> {
    pub fn new(gateway: G, config: GeneratorConfig) -> Self {
        Self {
            gateway,
            config,
            lore: Lore::default(),
            completed: BTreeSet::new(),
        }
    }

    /// The lore generated so far.
    pub fn lore(&self) -> &Lore {
        &self.lore
    }

    pub fn is_done(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    /// The first world stage that has not produced output yet.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::WORLD.into_iter().find(|s| !self.is_done(*s))
    }

    /// Run the next world stage, or reroll `stage` if it already ran.
    pub async fn run_stage(&mut self, stage: Stage, seed: Option<&str>) -> Result<(), BuildError> {
        match stage {
            Stage::Foundation => self.foundation(seed).await,
            Stage::Factions => self.factions().await,
            Stage::Cosmology => self.cosmology().await,
            Stage::MagicSystem => self.magic_system().await,
            Stage::Inhabitants => self.inhabitants().await,
            Stage::FinalDetails => self.final_details().await,
            Stage::Scenario | Stage::Turn => Err(BuildError::OutOfOrder {
                stage,
                missing: Stage::FinalDetails,
            }),
        }
    }

    pub async fn foundation(&mut self, seed: Option<&str>) -> Result<(), BuildError> {
        let output: FoundationOutput = self.generate(prompts::foundation(seed)).await?;
        self.lore.name = output.name;
        self.lore.core_concept = output.core_concept;
        self.lore.timeline = output.timeline;
        self.finish(Stage::Foundation);
        Ok(())
    }

    pub async fn factions(&mut self) -> Result<(), BuildError> {
        self.check_ready(Stage::Factions)?;
        let output: FactionsOutput = self.generate(prompts::factions(&self.lore)).await?;
        self.lore.factions = output.factions;
        self.finish(Stage::Factions);
        Ok(())
    }

    pub async fn cosmology(&mut self) -> Result<(), BuildError> {
        self.check_ready(Stage::Cosmology)?;
        let output: CosmologyOutput = self.generate(prompts::cosmology(&self.lore)).await?;
        self.lore.cosmology = output.cosmology;
        self.finish(Stage::Cosmology);
        Ok(())
    }

    pub async fn magic_system(&mut self) -> Result<(), BuildError> {
        self.check_ready(Stage::MagicSystem)?;
        let output: MagicSystemOutput = self.generate(prompts::magic_system(&self.lore)).await?;
        self.lore.magic_system = output.magic_system;
        self.finish(Stage::MagicSystem);
        Ok(())
    }

    pub async fn inhabitants(&mut self) -> Result<(), BuildError> {
        self.check_ready(Stage::Inhabitants)?;
        let output: InhabitantsOutput = self.generate(prompts::inhabitants(&self.lore)).await?;
        self.lore.races = output.races;
        self.lore.creatures = output.creatures;
        self.lore.historical_figures = output.historical_figures;
        self.finish(Stage::Inhabitants);
        Ok(())
    }

    pub async fn final_details(&mut self) -> Result<(), BuildError> {
        self.check_ready(Stage::FinalDetails)?;
        let output: FinalDetailsOutput = self.generate(prompts::final_details(&self.lore)).await?;
        self.lore.locations = output.locations;
        self.lore.secrets = output.secrets;
        self.finish(Stage::FinalDetails);
        Ok(())
    }

    /// Generate a scenario for the finished world.
    ///
    /// Calling this again is a reroll; nothing is stored until
    /// [`into_game`](Self::into_game) accepts one.
    pub async fn scenario(&self, concept: Option<&str>) -> Result<Scenario, BuildError> {
        self.check_ready(Stage::Scenario)?;
        let output: ScenarioOutput = self.generate(prompts::scenario(&self.lore, concept)).await?;
        Ok(Scenario::from(output))
    }

    /// Generate an emblem for every faction, one at a time.
    ///
    /// A failed emblem is logged and left empty. Returns how many emblems
    /// were attached.
    #[instrument(skip_all, fields(factions = self.lore.factions.len()))]
    pub async fn attach_emblems(&mut self, images: &dyn ImageGenerator) -> usize {
        let mut attached = 0;
        for faction in &mut self.lore.factions {
            let prompt = prompts::emblem(faction);
            match images.generate(&prompt, PLACEHOLDER_IMAGE).await {
                Ok(image) => {
                    faction.emblem = Some(image);
                    attached += 1;
                }
                Err(e) => {
                    warn!(faction = %faction.name, error = %e, "emblem generation failed");
                    faction.emblem = None;
                }
            }
        }
        attached
    }

    /// Start a game in the finished world.
    pub fn into_game(self, scenario: Scenario) -> GameState {
        info!(world = %self.lore.name, character = %scenario.character.name, "starting game");
        GameState::new(Arc::new(self.lore), scenario)
    }

    /// Start a game and keep using this builder's gateway for its turns.
    pub fn into_session(self, scenario: Scenario) -> GameSession<G> {
        let config = self.config.clone();
        let gateway = self.gateway;
        let state = GameState::new(Arc::new(self.lore), scenario);
        GameSession::new(gateway, config, state)
    }

    fn check_ready(&self, stage: Stage) -> Result<(), BuildError> {
        match Stage::WORLD.into_iter().find(|s| *s < stage && !self.is_done(*s)) {
            Some(missing) => Err(BuildError::OutOfOrder { stage, missing }),
            None => Ok(()),
        }
    }

    fn finish(&mut self, stage: Stage) {
        if !self.completed.insert(stage) {
            info!(%stage, "stage rerolled");
        } else {
            info!(%stage, "stage generated");
        }
    }

    async fn generate<T: DeserializeOwned>(&self, prompt: Prompt) -> Result<T, BuildError> {
        let stage = prompt.stage;
        let request = GenerationRequest::new(prompt, &self.config);
        let value = self.gateway.generate(request).await?;
        serde_json::from_value(value).map_err(|e| BuildError::Malformed {
            stage,
            message: e.to_string(),
        })
    }
}
