//! Scripted play-throughs using the mock gateway.
//!
//! These run without network access: every turn is replayed from a scripted
//! fragment stream.

use taleforge_core::items::{Item, ItemType, Rarity};
use taleforge_core::lore::{Location, LoreCharacter, LoreUpdate};
use taleforge_core::quest::{Objective, Quest, QuestStatus, QuestUpdate};
use taleforge_core::testing::{
    assert_has_item, assert_health, assert_level, assert_location, assert_no_item,
    assert_quest_status, sample_turn, stage_output, TestHarness,
};
use taleforge_core::turn::{CharacterUpdate, DialogueLine};
use taleforge_core::{
    ActionRejected, GeneratorConfig, MockGateway, MockImages, SessionError, Speaker, Stage,
    StatAllocation, TurnOutcome, WorldBuilder,
};

#[tokio::test]
async fn test_hello_world_stream() {
    let mut harness = TestHarness::new();
    harness.expect_fragments(&[
        r#"{"narrative":"Hel"#,
        "lo wor",
        r#"ld","newLocation":"Gull Market","updatedInventory":[],"newObjective":"Find work before nightfall.","isGameOver":false}"#,
    ]);

    let outcome = harness.act("I listen").await.unwrap();

    assert_eq!(harness.previews, vec!["Hel", "Hello wor", "Hello world"]);
    assert!(matches!(outcome, TurnOutcome::Completed { ref narrative, .. } if narrative == "Hello world"));
    assert_eq!(harness.last_text(), Some("Hello world"));
}

#[tokio::test]
async fn test_turn_with_dialogue_and_items() {
    let mut harness = TestHarness::new();
    let mut turn = sample_turn("A fishmonger waves you over.");
    turn.dialogue = vec![DialogueLine {
        speaker: "Fishmonger".to_string(),
        text: "Need coin? Gut these.".to_string(),
    }];
    turn.updated_inventory = vec![Item::new("Gutting Knife", "Thin and sharp", ItemType::Equipment)
        .with_rarity(Rarity::Uncommon)];
    turn.new_location = "Fish Row".to_string();
    harness.expect_turn(&turn);

    harness.act("I ask about work").await.unwrap();

    assert_location(&harness, "Fish Row");
    assert_has_item(&harness, "Gutting Knife");
    assert_no_item(&harness, "Boathook");
    assert_eq!(
        harness.recent_speakers(3),
        vec![
            Speaker::Player,
            Speaker::Narrator,
            Speaker::Character("Fishmonger".to_string())
        ]
    );
}

#[tokio::test]
async fn test_truncated_turn_changes_nothing_but_the_log() {
    let mut harness = TestHarness::new();
    harness.expect_fragments(&[r#"{"narrative":"The deck tilts","newLocation":"Hold","updatedInv"#]);
    let before = harness.state().clone();

    let outcome = harness.act("I go below").await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(harness.previews, vec!["The deck tilts".to_string()]);
    let state = harness.state();
    assert_eq!(state.location, before.location);
    assert_eq!(state.inventory, before.inventory);
    assert_eq!(state.quests, before.quests);
    assert_eq!(state.story.len(), before.story.len() + 2);
    assert!(state.last_entry().unwrap().text.starts_with("The story falters"));

    // The next turn is accepted.
    harness.expect_turn(&sample_turn("You steady yourself."));
    assert!(matches!(
        harness.act("I try again").await.unwrap(),
        TurnOutcome::Completed { .. }
    ));
}

#[tokio::test]
async fn test_stream_error_midway() {
    let mut harness = TestHarness::new();
    harness
        .gateway
        .push_broken_stream([r#"{"narrative":"Thunder"#], "connection reset");

    let outcome = harness.act("I wait out the storm").await.unwrap();
    let TurnOutcome::Failed(message) = outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("connection reset"));
    assert!(harness.state().gate().is_ok());
}

#[tokio::test]
async fn test_quest_lifecycle() {
    let mut harness = TestHarness::new();

    let mut start = sample_turn("A child begs you to find her cat.");
    start.new_quest = Some(Quest::new(
        "Lost Cat",
        "Find Whiskers",
        vec![
            Objective::new("Search the docks").with_sub_objectives(vec![
                Objective::new("Check the nets"),
                Objective::new("Check the crates"),
            ]),
            Objective::new("Return Whiskers"),
        ],
    ));
    harness.expect_turn(&start);
    harness.act("I agree to help").await.unwrap();
    assert_quest_status(&harness, "Lost Cat", QuestStatus::Active);

    for (objective, expected) in [
        ("Check the nets", QuestStatus::Active),
        ("Check the crates", QuestStatus::Active),
        ("Return Whiskers", QuestStatus::Completed),
    ] {
        let mut turn = sample_turn("Progress.");
        turn.quest_update = Some(QuestUpdate {
            quest_title: "Lost Cat".to_string(),
            completed_objective: Some(objective.to_string()),
            status: None,
        });
        harness.expect_turn(&turn);
        harness.act("I keep looking").await.unwrap();
        assert_quest_status(&harness, "Lost Cat", expected);
    }

    let quest = harness.state().quest("Lost Cat").unwrap();
    assert!(quest.objectives[0].completed, "parent promoted once both children completed");
}

#[tokio::test]
async fn test_level_up_gates_actions() {
    let mut harness = TestHarness::new();
    let mut turn = sample_turn("You win the wrestling match.");
    turn.character_update = Some(CharacterUpdate {
        health: Some(70),
        xp_gained: Some(120),
        ..Default::default()
    });
    harness.expect_turn(&turn);
    harness.act("I wrestle the dockhand").await.unwrap();

    let err = harness.act("I celebrate").await.unwrap_err();
    assert!(matches!(err, SessionError::Rejected(ActionRejected::LevelUpPending)));

    let err = harness
        .session
        .confirm_level_up(StatAllocation::new(5, 5, 5))
        .unwrap_err();
    assert!(matches!(err, SessionError::LevelUp(_)));

    harness
        .session
        .confirm_level_up(StatAllocation::new(4, 2, 4))
        .unwrap();
    assert_level(&harness, 2);
    assert_health(&harness, 120, 120);
    assert_eq!(harness.state().character().xp, 20);
    assert_eq!(harness.state().character().xp_to_next_level, 150);
}

#[tokio::test]
async fn test_lore_accept_and_reject() {
    let mut harness = TestHarness::new();
    let lore_before = harness.state().lore().clone();

    let mut turn = sample_turn("The harbourmaster mentions a drowned chapel.");
    turn.lore_update = Some(LoreUpdate {
        locations: vec![
            Location {
                name: "Drowned Chapel".to_string(),
                description: "Bells ring beneath the waves.".to_string(),
            },
            Location {
                name: "Gull Market".to_string(),
                description: "Duplicate of a known place.".to_string(),
            },
        ],
        characters: vec![LoreCharacter {
            name: "Harbourmaster Quill".to_string(),
            description: "Counts every ship twice.".to_string(),
        }],
        knowledge: vec![],
    });
    harness.expect_turn(&turn);
    harness.act("I ask about the bells").await.unwrap();

    assert_eq!(**harness.state().lore(), *lore_before);
    let err = harness.act("I leave").await.unwrap_err();
    assert!(matches!(err, SessionError::Rejected(ActionRejected::LoreDecisionPending)));

    harness.session.accept_lore().unwrap();
    let lore = harness.state().lore();
    assert_eq!(lore.locations.len(), lore_before.locations.len() + 1);
    assert_eq!(lore.characters.len(), lore_before.characters.len() + 1);
    assert!(harness.state().gate().is_ok());

    // A second discovery, rejected this time.
    let accepted = harness.state().lore().clone();
    let mut turn = sample_turn("A rumour of a sea witch.");
    turn.lore_update = Some(LoreUpdate {
        knowledge: vec!["A witch lives under the breakwater.".to_string()],
        ..Default::default()
    });
    harness.expect_turn(&turn);
    harness.act("I listen to rumours").await.unwrap();
    harness.session.reject_lore().unwrap();
    assert_eq!(**harness.state().lore(), *accepted);
}

#[tokio::test]
async fn test_game_over_blocks_further_actions() {
    let mut harness = TestHarness::new();
    let mut turn = sample_turn("The tide takes you.");
    turn.is_game_over = true;
    turn.game_over_message = Some("Your tale ends beneath the waves.".to_string());
    harness.expect_turn(&turn);

    harness.act("I jump into the sea").await.unwrap();
    assert!(harness.state().is_game_over);

    let err = harness.act("I swim").await.unwrap_err();
    assert!(matches!(err, SessionError::Rejected(ActionRejected::GameOver)));
}

#[tokio::test]
async fn test_world_to_first_turn() {
    let gateway = MockGateway::new();
    for stage in Stage::WORLD {
        gateway.push_response(stage_output(stage));
    }
    gateway.push_response(stage_output(Stage::Scenario));
    gateway.push_turn(&sample_turn("Gulls wheel overhead."), 11);

    let mut world = WorldBuilder::new(gateway.clone(), GeneratorConfig::default());
    while let Some(stage) = world.next_stage() {
        world.run_stage(stage, Some("drowned islands")).await.unwrap();
    }

    let images = MockImages::new();
    images.push_image("wardens.png");
    images.push_failure("blocked prompt");
    assert_eq!(world.attach_emblems(&images).await, 1);

    let scenario = world.scenario(None).await.unwrap();
    let mut session = world.into_session(scenario);
    assert_eq!(session.state().lore().factions[0].emblem.as_deref(), Some("wardens.png"));
    assert_eq!(session.state().lore().factions[1].emblem, None);

    let outcome = session.player_action("I look around", |_| {}).await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 8);
    assert_eq!(requests[0].stage, Stage::Foundation);
    assert!(requests[0].prompt.contains("drowned islands"));
    assert_eq!(requests[7].stage, Stage::Turn);
    assert!(requests[7].prompt.contains("Brinehollow"));
}
