//! Line-oriented front-end.
//!
//! The wizard shows each world stage as it is generated; press enter to
//! keep it or type `#reroll` to generate it again. The game loop then sends
//! every plain line as a player action. Lines starting with `#` are
//! commands (`#help` lists them).

use std::io::{self, BufRead, Write};
use taleforge_core::lore::Lore;
use taleforge_core::quest::Objective;
use taleforge_core::{
    ClaudeGateway, GameSession, GeneratorConfig, NoImages, Stage, StatAllocation, TurnOutcome,
    WorldBuilder,
};

/// Ideas passed on the command line.
#[derive(Debug, Default)]
pub struct Options {
    pub seed: Option<String>,
    pub concept: Option<String>,
}

/// What the player chose after seeing a generated stage.
enum Choice {
    Accept,
    Reroll,
    Quit,
}

type Input = io::Lines<io::StdinLock<'static>>;

/// Run the wizard and then the game.
pub async fn run(gateway: ClaudeGateway, config: GeneratorConfig, options: Options) -> io::Result<()> {
    let mut input = io::stdin().lock().lines();

    println!("=== Taleforge ===");
    println!("Press enter to accept each stage, #reroll to generate it again, #quit to exit.");
    println!();

    let mut world = WorldBuilder::new(gateway, config);
    while let Some(stage) = world.next_stage() {
        loop {
            print!("[GENERATING] {stage}...");
            io::stdout().flush()?;
            let result = world.run_stage(stage, options.seed.as_deref()).await;
            print!("\r\x1b[2K");

            match result {
                Ok(()) => print_stage(world.lore(), stage),
                Err(e) => println!("[ERROR] {e}"),
            }

            match choose(&mut input)? {
                Choice::Accept if world.is_done(stage) => break,
                Choice::Accept | Choice::Reroll => continue,
                Choice::Quit => return Ok(()),
            }
        }
    }

    world.attach_emblems(&NoImages).await;

    let scenario = loop {
        print!("[GENERATING] {}...", Stage::Scenario);
        io::stdout().flush()?;
        let result = world.scenario(options.concept.as_deref()).await;
        print!("\r\x1b[2K");

        let scenario = match result {
            Ok(scenario) => scenario,
            Err(e) => {
                println!("[ERROR] {e}");
                match choose(&mut input)? {
                    Choice::Quit => return Ok(()),
                    _ => continue,
                }
            }
        };

        let character = &scenario.character;
        println!("[CHARACTER] {}", character.name);
        println!("{}", character.backstory);
        println!(
            "Health {}  Mana {}  Stamina {}",
            character.max_health, character.max_mana, character.max_stamina
        );
        println!("[GOAL] {}", scenario.goal);
        println!("[OBJECTIVE] {}", scenario.objective);
        println!();

        match choose(&mut input)? {
            Choice::Accept => break scenario,
            Choice::Reroll => continue,
            Choice::Quit => return Ok(()),
        }
    };

    let mut session = world.into_session(scenario);
    play(&mut session, &mut input).await
}

async fn play(session: &mut GameSession<ClaudeGateway>, input: &mut Input) -> io::Result<()> {
    println!("[{}]", session.state().location);
    if let Some(opening) = session.state().last_entry() {
        println!("{}", opening.text);
    }
    println!();
    println!("Enter your actions (one per line). Type #help for commands.");
    println!();

    for line in input.by_ref() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("use") if parts.len() > 1 => {
                    let name = parts[1..].join(" ");
                    let before = session.state().story.len();
                    let outcome = session.use_item(&name, preview_printer()).await;
                    report_turn(session, before, outcome);
                }
                Some("accept") => match session.accept_lore() {
                    Ok(()) => println!("[LORE] Added to your journal."),
                    Err(e) => println!("[REJECTED] {e}"),
                },
                Some("reject") => match session.reject_lore() {
                    Ok(()) => println!("[LORE] Discarded."),
                    Err(e) => println!("[REJECTED] {e}"),
                },
                Some("levelup") => match parse_allocation(&parts[1..]) {
                    Some(allocation) => match session.confirm_level_up(allocation) {
                        Ok(()) => print_status(session),
                        Err(e) => println!("[REJECTED] {e}"),
                    },
                    None => println!("[ERROR] Usage: #levelup <health> <mana> <stamina>"),
                },
                Some("status") => print_status(session),
                Some("quests") => print_quests(session),
                Some("inventory") => print_inventory(session),
                Some("lore") => print_lore(session.state().lore()),
                Some("help") => print_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            io::stdout().flush()?;
            if session.state().is_game_over {
                break;
            }
            continue;
        }

        let before = session.state().story.len();
        let outcome = session.player_action(line, preview_printer()).await;
        report_turn(session, before, outcome);
        io::stdout().flush()?;

        if session.state().is_game_over {
            break;
        }
    }

    Ok(())
}

/// A preview callback that prints only the newly streamed text.
fn preview_printer() -> impl FnMut(&str) {
    let mut printed = String::new();
    move |preview: &str| {
        let mut stdout = io::stdout();
        match preview.strip_prefix(printed.as_str()) {
            Some(rest) => {
                let _ = write!(stdout, "{rest}");
            }
            None => {
                let _ = write!(stdout, "\n{preview}");
            }
        }
        let _ = stdout.flush();
        printed = preview.to_string();
    }
}

fn report_turn(
    session: &GameSession<ClaudeGateway>,
    before: usize,
    outcome: Result<TurnOutcome, taleforge_core::SessionError>,
) {
    match outcome {
        Ok(TurnOutcome::Completed { scene, .. }) => {
            println!();
            // Dialogue follows the player's action and the narrative.
            for entry in session.state().story.iter().skip(before + 2) {
                if let Some(name) = entry.speaker_name() {
                    println!("{name}: \"{}\"", entry.text);
                }
            }
            if let Some(scene) = scene {
                println!("[SCENE] {scene}");
            }
            println!();

            let state = session.state();
            if let Some(update) = state.pending_lore() {
                println!("[LORE] New discoveries:");
                for location in &update.locations {
                    println!("  Place: {} - {}", location.name, location.description);
                }
                for character in &update.characters {
                    println!("  Person: {} - {}", character.name, character.description);
                }
                for fact in &update.knowledge {
                    println!("  Fact: {fact}");
                }
                println!("  #accept to keep them, #reject to discard them.");
            }
            if state.is_level_up_pending() {
                println!("[LEVEL UP] Spend 10 points: #levelup <health> <mana> <stamina>");
            }
            if state.is_game_over {
                println!("[GAME OVER] {}", state.game_over_message.as_deref().unwrap_or("The End."));
            }
        }
        Ok(TurnOutcome::Failed(message)) => {
            println!();
            println!("[ERROR] {message}");
        }
        Err(e) => println!("[REJECTED] {e}"),
    }
}

fn choose(input: &mut Input) -> io::Result<Choice> {
    print!("> ");
    io::stdout().flush()?;
    match input.next() {
        None => Ok(Choice::Quit),
        Some(line) => Ok(match line?.trim() {
            "#quit" | "#exit" => Choice::Quit,
            "#reroll" => Choice::Reroll,
            _ => Choice::Accept,
        }),
    }
}

fn parse_allocation(args: &[&str]) -> Option<StatAllocation> {
    match args {
        [health, mana, stamina] => Some(StatAllocation::new(
            health.parse().ok()?,
            mana.parse().ok()?,
            stamina.parse().ok()?,
        )),
        _ => None,
    }
}

fn print_stage(lore: &Lore, stage: Stage) {
    println!("[{}]", stage.name().to_uppercase());
    match stage {
        Stage::Foundation => {
            println!("{}", lore.name);
            println!("{}", lore.core_concept);
            for era in &lore.timeline {
                println!("  {}: {}", era.name, era.description);
            }
        }
        Stage::Factions => {
            for faction in &lore.factions {
                println!("  {} (led by {}): {}", faction.name, faction.leader, faction.description);
            }
        }
        Stage::Cosmology => {
            println!("{}", lore.cosmology.creation_myth);
            for deity in &lore.cosmology.deities {
                println!("  {}, {}: {}", deity.name, deity.domain, deity.description);
            }
        }
        Stage::MagicSystem => {
            println!("{}: {}", lore.magic_system.name, lore.magic_system.description);
            for rule in &lore.magic_system.rules {
                println!("  - {rule}");
            }
        }
        Stage::Inhabitants => {
            for race in &lore.races {
                println!("  {}: {}", race.name, race.description);
            }
            for creature in &lore.creatures {
                println!("  {} ({}): {}", creature.name, creature.habitat, creature.description);
            }
            for figure in &lore.historical_figures {
                println!("  {} of {}: {}", figure.name, figure.era, figure.description);
            }
        }
        Stage::FinalDetails => {
            for location in &lore.locations {
                println!("  {}: {}", location.name, location.description);
            }
            println!("  ({} secrets hidden)", lore.secrets.len());
        }
        Stage::Scenario | Stage::Turn => {}
    }
    println!();
}

fn print_status(session: &GameSession<ClaudeGateway>) {
    let state = session.state();
    let character = state.character();
    println!("[STATUS]");
    println!("  {} (level {})", character.name, character.level);
    println!("  Health: {}/{}", character.health, character.max_health);
    println!("  Mana: {}/{}", character.mana, character.max_mana);
    println!("  Stamina: {}/{}", character.stamina, character.max_stamina);
    println!("  XP: {}/{}", character.xp, character.xp_to_next_level);
    println!("  Location: {}", state.location);
    println!("  Objective: {}", state.objective);
}

fn print_quests(session: &GameSession<ClaudeGateway>) {
    let quests = &session.state().quests;
    if quests.is_empty() {
        println!("[QUESTS] None yet.");
        return;
    }
    println!("[QUESTS]");
    for quest in quests {
        println!("  {} ({})", quest.title, quest.status);
        print_objectives(&quest.objectives, 2);
    }
}

fn print_objectives(objectives: &[Objective], indent: usize) {
    for objective in objectives {
        let mark = if objective.completed { "x" } else { " " };
        println!("{}[{mark}] {}", "  ".repeat(indent), objective.text);
        print_objectives(&objective.sub_objectives, indent + 1);
    }
}

fn print_inventory(session: &GameSession<ClaudeGateway>) {
    let inventory = &session.state().inventory;
    if inventory.is_empty() {
        println!("[INVENTORY] Empty.");
        return;
    }
    println!("[INVENTORY]");
    for item in inventory {
        let usable = if item.usable { ", usable" } else { "" };
        println!("  {} ({} {}{usable}): {}", item.name, item.rarity, item.item_type.name(), item.description);
        if !item.effects.is_empty() {
            println!("    {}", item.effect_summary());
        }
    }
}

fn print_lore(lore: &Lore) {
    println!("[LORE] {}", lore.name);
    println!("  {}", lore.core_concept);
    for faction in &lore.factions {
        println!("  Faction: {} - {}", faction.name, faction.ideology);
    }
    for location in &lore.locations {
        println!("  Place: {} - {}", location.name, location.description);
    }
    for character in &lore.characters {
        println!("  Person: {} - {}", character.name, character.description);
    }
    for fact in &lore.knowledge {
        println!("  Fact: {fact}");
    }
}

fn print_help() {
    println!("[HELP]");
    println!("  #use <item>                       - Use an item from your inventory");
    println!("  #accept / #reject                 - Decide on newly discovered lore");
    println!("  #levelup <health> <mana> <stamina> - Spend 10 level-up points");
    println!("  #status                           - Show your character");
    println!("  #quests                           - Show side quests");
    println!("  #inventory                        - Show your inventory");
    println!("  #lore                             - Show what you know of the world");
    println!("  #quit                             - Exit the game");
    println!("  (anything else is sent as your action)");
}
