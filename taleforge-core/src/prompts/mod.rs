//! Prompt builder.
//!
//! Every function here is pure: the same lore, state and action always
//! produce the same prompt text. Each prompt carries the schema of the stage
//! it asks for, so a [`Prompt`] is everything the gateway needs besides the
//! sampling settings.

use crate::items::Item;
use crate::lore::{Faction, Lore};
use crate::quest::{Objective, Quest};
use crate::schema::Stage;
use crate::state::{GameState, Speaker};
use serde_json::Value;

const WORLDBUILDER_PROMPT: &str = include_str!("worldbuilder.txt");
const NARRATOR_PROMPT: &str = include_str!("narrator.txt");

/// A fully rendered request for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub stage: Stage,
    pub system: &'static str,
    pub text: String,
    pub schema: Value,
}

impl Prompt {
    fn new(stage: Stage, text: String) -> Self {
        let system = match stage {
            Stage::Turn => NARRATOR_PROMPT,
            _ => WORLDBUILDER_PROMPT,
        };
        Self {
            stage,
            system,
            text,
            schema: stage.schema(),
        }
    }
}

// ============================================================================
// World stages
// ============================================================================

/// Ask for the world's name, concept and timeline.
pub fn foundation(seed: Option<&str>) -> Prompt {
    let mut text = String::from("Create the foundation of a new fantasy world.\n\n");
    match seed.map(str::trim).filter(|s| !s.is_empty()) {
        Some(seed) => {
            text.push_str(&format!("Build it around this idea from the player: {seed}\n"));
        }
        None => text.push_str("Surprise the player with an original premise.\n"),
    }
    text.push_str(
        "\nGive the world a name, a core concept of two or three sentences, and a \
         timeline of three to five eras in chronological order.",
    );
    Prompt::new(Stage::Foundation, text)
}

pub fn factions(lore: &Lore) -> Prompt {
    let mut text = world_context(lore);
    text.push_str(
        "\nCreate three to five factions vying for power in this world. Give each a \
         leader, a headquarters, an ideology, and its attitude to the other factions. \
         At least two of them should be in open conflict.",
    );
    Prompt::new(Stage::Factions, text)
}

pub fn cosmology(lore: &Lore) -> Prompt {
    let mut text = world_context(lore);
    text.push_str(
        "\nDescribe the creation myth of this world and three to six deities. The \
         factions above should have reasons to revere or defy some of them.",
    );
    Prompt::new(Stage::Cosmology, text)
}

pub fn magic_system(lore: &Lore) -> Prompt {
    let mut text = world_context(lore);
    text.push_str(
        "\nDefine the one system of magic practised in this world. List three to five \
         rules, each with a clear cost or limit.",
    );
    Prompt::new(Stage::MagicSystem, text)
}

pub fn inhabitants(lore: &Lore) -> Prompt {
    let mut text = world_context(lore);
    text.push_str(
        "\nDescribe who lives here: three or four sapient races, three to five notable \
         creatures with their habitats, and three historical figures, each tied to one \
         of the eras above.",
    );
    Prompt::new(Stage::Inhabitants, text)
}

pub fn final_details(lore: &Lore) -> Prompt {
    let mut text = world_context(lore);
    text.push_str(
        "\nFinish the world with four to six notable locations and two or three \
         secrets known to almost no one. Secrets should recast something already \
         established.",
    );
    Prompt::new(Stage::FinalDetails, text)
}

/// Ask for the player character and opening situation.
pub fn scenario(lore: &Lore, concept: Option<&str>) -> Prompt {
    let mut text = world_context(lore);
    text.push_str("\nCreate the player character and the situation their story begins in.\n");
    match concept.map(str::trim).filter(|c| !c.is_empty()) {
        Some(concept) => {
            text.push_str(&format!("The player wants to play: {concept}\n"));
        }
        None => text.push_str("Choose a character who would be interesting in this world.\n"),
    }
    text.push_str(
        "\nGive them a long-term goal, an immediate objective, a starting location \
         drawn from the world, and two or three modest starting items.",
    );
    Prompt::new(Stage::Scenario, text)
}

// ============================================================================
// Turns
// ============================================================================

/// Ask for the next turn after the player's `action`.
///
/// Includes the last `recent` story entries. The action itself is expected
/// to be the last of them already; it is repeated at the end either way.
pub fn turn(state: &GameState, action: &str, recent: usize) -> Prompt {
    let lore = state.lore();
    let character = state.character();
    let mut text = String::new();

    text.push_str(&format!("## World: {}\n", lore.name));
    text.push_str(&format!("{}\n", lore.core_concept));
    if !lore.locations.is_empty() {
        let names: Vec<&str> = lore.locations.iter().map(|l| l.name.as_str()).collect();
        text.push_str(&format!("Known places: {}\n", names.join(", ")));
    }
    if !lore.characters.is_empty() {
        let names: Vec<&str> = lore.characters.iter().map(|c| c.name.as_str()).collect();
        text.push_str(&format!("Known people: {}\n", names.join(", ")));
    }

    text.push_str("\n## Player Character\n");
    text.push_str(&format!("**Name:** {} (level {})\n", character.name, character.level));
    text.push_str(&format!(
        "**Health:** {}/{}  **Mana:** {}/{}  **Stamina:** {}/{}\n",
        character.health,
        character.max_health,
        character.mana,
        character.max_mana,
        character.stamina,
        character.max_stamina,
    ));
    text.push_str(&format!("**XP:** {}/{}\n", character.xp, character.xp_to_next_level));
    text.push_str(&format!("**Goal:** {}\n", state.scenario.goal));

    text.push_str("\n## Situation\n");
    text.push_str(&format!("Location: {}\n", state.location));
    text.push_str(&format!("Objective: {}\n", state.objective));

    text.push_str("\n## Inventory\n");
    if state.inventory.is_empty() {
        text.push_str("(empty)\n");
    }
    for item in &state.inventory {
        render_item(&mut text, item);
    }

    let active: Vec<&Quest> = state
        .quests
        .iter()
        .filter(|q| q.status == crate::quest::QuestStatus::Active)
        .collect();
    if !active.is_empty() {
        text.push_str("\n## Side Quests\n");
        for quest in active {
            text.push_str(&format!("### {}\n", quest.title));
            text.push_str(&format!("{}\n", quest.description));
            render_objectives(&mut text, &quest.objectives, 0);
        }
    }

    text.push_str("\n## Story So Far\n");
    for entry in state.recent_story(recent) {
        if entry.illustration.is_some() {
            continue;
        }
        let speaker = match &entry.speaker {
            Speaker::Player => "Player",
            Speaker::Narrator => "Narrator",
            Speaker::Character(name) => name.as_str(),
        };
        text.push_str(&format!("{speaker}: {}\n", entry.text));
    }

    text.push_str(&format!("\n## Player Action\n{}\n", action.trim()));
    Prompt::new(Stage::Turn, text)
}

// ============================================================================
// Images
// ============================================================================

/// Image prompt for a faction's emblem.
pub fn emblem(faction: &Faction) -> String {
    format!(
        "A heraldic emblem for {}, a faction whose ideology is: {}. \
         Flat symbolic design on a plain background, no text.",
        faction.name, faction.ideology
    )
}

/// Image prompt for a scene illustration.
pub fn scene(description: &str) -> String {
    format!(
        "Fantasy illustration, painterly style, no text. {}",
        description.trim()
    )
}

// ============================================================================
// Rendering helpers
// ============================================================================

/// Everything generated so far, skipping sections that are still empty.
fn world_context(lore: &Lore) -> String {
    let mut text = String::new();
    text.push_str(&format!("## World: {}\n", lore.name));
    text.push_str(&format!("{}\n", lore.core_concept));

    if !lore.timeline.is_empty() {
        text.push_str("\n### Timeline\n");
        for era in &lore.timeline {
            text.push_str(&format!("- **{}**: {}\n", era.name, era.description));
        }
    }

    if !lore.factions.is_empty() {
        text.push_str("\n### Factions\n");
        for faction in &lore.factions {
            text.push_str(&format!(
                "- **{}** (led by {}, based in {}): {} Ideology: {}\n",
                faction.name,
                faction.leader,
                faction.headquarters,
                faction.description,
                faction.ideology,
            ));
        }
    }

    if !lore.cosmology.creation_myth.is_empty() {
        text.push_str("\n### Cosmology\n");
        text.push_str(&format!("{}\n", lore.cosmology.creation_myth));
        for deity in &lore.cosmology.deities {
            text.push_str(&format!(
                "- **{}**, {}: {}\n",
                deity.name, deity.domain, deity.description
            ));
        }
    }

    if !lore.magic_system.name.is_empty() {
        text.push_str(&format!("\n### Magic: {}\n", lore.magic_system.name));
        text.push_str(&format!("{}\n", lore.magic_system.description));
        for rule in &lore.magic_system.rules {
            text.push_str(&format!("- {rule}\n"));
        }
    }

    if !lore.races.is_empty() {
        text.push_str("\n### Races\n");
        for race in &lore.races {
            text.push_str(&format!("- **{}**: {}\n", race.name, race.description));
        }
    }

    if !lore.creatures.is_empty() {
        text.push_str("\n### Creatures\n");
        for creature in &lore.creatures {
            text.push_str(&format!(
                "- **{}** ({}): {}\n",
                creature.name, creature.habitat, creature.description
            ));
        }
    }

    if !lore.historical_figures.is_empty() {
        text.push_str("\n### Historical Figures\n");
        for figure in &lore.historical_figures {
            text.push_str(&format!(
                "- **{}** ({}): {}\n",
                figure.name, figure.era, figure.description
            ));
        }
    }

    if !lore.locations.is_empty() {
        text.push_str("\n### Locations\n");
        for location in &lore.locations {
            text.push_str(&format!("- **{}**: {}\n", location.name, location.description));
        }
    }

    text
}

fn render_item(text: &mut String, item: &Item) {
    text.push_str(&format!("- {} [{} {}]", item.name, item.rarity, item.item_type.name()));
    if item.usable {
        text.push_str(" (usable)");
    }
    if !item.effects.is_empty() {
        text.push_str(&format!(" {}", item.effect_summary()));
    }
    text.push_str(&format!(": {}\n", item.description));
}

fn render_objectives(text: &mut String, objectives: &[Objective], depth: usize) {
    for objective in objectives {
        let mark = if objective.completed { "x" } else { " " };
        text.push_str(&format!("{}- [{mark}] {}\n", "  ".repeat(depth), objective.text));
        render_objectives(text, &objective.sub_objectives, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemType;
    use crate::quest::Quest;
    use crate::testing::{sample_lore, sample_state};

    #[test]
    fn test_foundation_uses_seed() {
        let prompt = foundation(Some("  a world inside a dying whale "));
        assert_eq!(prompt.stage, Stage::Foundation);
        assert!(prompt.text.contains("a world inside a dying whale\n"));
        assert_eq!(prompt.schema, Stage::Foundation.schema());
        assert_eq!(prompt.system, WORLDBUILDER_PROMPT);

        let blank = foundation(Some("   "));
        assert!(blank.text.contains("Surprise the player"));
    }

    #[test]
    fn test_world_context_skips_empty_sections() {
        let lore = Lore {
            name: "Vessa".to_string(),
            core_concept: "Islands adrift on fog.".to_string(),
            ..Default::default()
        };
        let prompt = factions(&lore);
        assert!(prompt.text.contains("## World: Vessa"));
        assert!(!prompt.text.contains("### Timeline"));
        assert!(!prompt.text.contains("### Cosmology"));

        let full = final_details(&sample_lore());
        assert!(full.text.contains("### Factions"));
        assert!(full.text.contains("Salt Wardens"));
    }

    #[test]
    fn test_turn_prompt_is_deterministic() {
        let state = sample_state().submit_action("I climb the mast").unwrap();
        let first = turn(&state, "I climb the mast", 10);
        let second = turn(&state, "I climb the mast", 10);
        assert_eq!(first, second);
        assert_eq!(first.system, NARRATOR_PROMPT);
        assert_eq!(first.stage, Stage::Turn);
    }

    #[test]
    fn test_turn_prompt_contents() {
        let mut state = sample_state();
        state.inventory.push(
            Item::new("Tide Tonic", "Smells of brine", ItemType::Consumable)
                .usable()
                .with_effect("health", 20),
        );
        let mut quest = Quest::new(
            "Lost Lens",
            "Recover the lighthouse lens",
            vec![Objective::new("Search the wreck")
                .with_sub_objectives(vec![Objective::new("Find the hold")])],
        );
        quest.objectives[0].sub_objectives[0].completed = true;
        state.quests.push(quest);

        let prompt = turn(&state, "  I drink the tonic ", 10);
        assert!(prompt.text.contains("Tide Tonic [Common Consumable] (usable) +20 health"));
        assert!(prompt.text.contains("- [ ] Search the wreck\n  - [x] Find the hold"));
        assert!(prompt.text.ends_with("## Player Action\nI drink the tonic\n"));
        assert!(prompt.text.contains(&format!("Location: {}", state.location)));
    }

    #[test]
    fn test_turn_prompt_limits_history() {
        let mut state = sample_state();
        for i in 0..5 {
            state = state.submit_action(&format!("step {i}")).unwrap().fail_turn("...");
        }
        let prompt = turn(&state, "look", 2);
        assert!(!prompt.text.contains("step 3"));
        assert!(prompt.text.contains("Player: step 4"));
    }

    #[test]
    fn test_image_prompts() {
        let lore = sample_lore();
        let text = emblem(&lore.factions[0]);
        assert!(text.contains(&lore.factions[0].name));
        assert!(scene(" A foggy pier ").ends_with("A foggy pier"));
    }
}
