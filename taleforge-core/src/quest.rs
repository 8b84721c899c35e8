//! Side quests and their objective trees.

use crate::schema::MAX_OBJECTIVE_DEPTH;
use serde::{Deserialize, Serialize};
use taleforge_macros::Schema;
use tracing::warn;

/// A side quest.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
pub struct Quest {
    /// Short, unique title of the quest
    pub title: String,
    /// What the quest is about
    pub description: String,
    /// Current state of the quest
    pub status: QuestStatus,
    /// Ordered checklist of objectives
    pub objectives: Vec<Objective>,
}

/// Lifecycle of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

/// A node in a quest's objective tree.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    /// What must be done
    pub text: String,
    /// Whether it has been done
    #[serde(default)]
    pub completed: bool,
    /// Smaller steps that make up this objective
    #[schema(recursive)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_objectives: Vec<Objective>,
}

/// A change to an existing quest, named by exact title.
#[derive(Debug, Clone, PartialEq, Schema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestUpdate {
    /// Exact title of the quest being updated
    pub quest_title: String,
    /// Exact text of the objective the player just completed
    pub completed_objective: Option<String>,
    /// Explicit new status, only when the quest was won or lost outright
    pub status: Option<QuestStatus>,
}

/// Outcome of searching an objective tree for a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    NotFound,
    Unchanged,
    Changed,
}

impl Objective {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
            sub_objectives: Vec::new(),
        }
    }

    pub fn with_sub_objectives(mut self, subs: Vec<Objective>) -> Self {
        self.sub_objectives = subs;
        self
    }

    /// Whether this objective and everything beneath it is completed.
    pub fn is_fully_completed(&self) -> bool {
        self.completed && self.sub_objectives.iter().all(Objective::is_fully_completed)
    }

    fn complete_subtree(&mut self) {
        self.completed = true;
        for sub in &mut self.sub_objectives {
            sub.complete_subtree();
        }
    }

    fn promote_if_children_complete(&mut self) {
        if !self.sub_objectives.is_empty() && self.sub_objectives.iter().all(|s| s.completed) {
            self.completed = true;
        }
    }

    fn truncate(&mut self, remaining: usize) -> usize {
        if remaining <= 1 {
            let dropped = self.sub_objectives.iter().map(Objective::count).sum();
            self.sub_objectives.clear();
            return dropped;
        }
        self.sub_objectives
            .iter_mut()
            .map(|s| s.truncate(remaining - 1))
            .sum()
    }

    fn count(&self) -> usize {
        1 + self.sub_objectives.iter().map(Objective::count).sum::<usize>()
    }
}

/// Mark the first objective (pre-order) with exactly `text` as completed,
/// then promote each ancestor on the changed path whose direct children are
/// now all completed.
fn mark_completed(nodes: &mut [Objective], text: &str) -> Mark {
    for node in nodes {
        if node.text == text {
            if node.is_fully_completed() {
                return Mark::Unchanged;
            }
            node.complete_subtree();
            return Mark::Changed;
        }

        match mark_completed(&mut node.sub_objectives, text) {
            Mark::NotFound => continue,
            Mark::Unchanged => return Mark::Unchanged,
            Mark::Changed => {
                node.promote_if_children_complete();
                return Mark::Changed;
            }
        }
    }
    Mark::NotFound
}

impl Quest {
    pub fn new(title: impl Into<String>, description: impl Into<String>, objectives: Vec<Objective>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: QuestStatus::Active,
            objectives,
        }
    }

    /// Whether every root objective is completed.
    pub fn all_objectives_completed(&self) -> bool {
        !self.objectives.is_empty() && self.objectives.iter().all(|o| o.completed)
    }

    /// Apply an update addressed to this quest. Returns whether anything changed.
    ///
    /// An explicit status always wins. Without one, an active quest whose root
    /// objectives are all completed becomes completed, even when the mark
    /// itself changed nothing.
    pub fn apply_update(&mut self, update: &QuestUpdate) -> bool {
        let before = self.clone();

        if let Some(text) = update.completed_objective.as_deref() {
            mark_completed(&mut self.objectives, text);
        }

        match update.status {
            Some(status) => self.status = status,
            None => {
                if self.status == QuestStatus::Active && self.all_objectives_completed() {
                    self.status = QuestStatus::Completed;
                }
            }
        }

        *self != before
    }

    /// Drop objectives nested deeper than [`MAX_OBJECTIVE_DEPTH`] levels.
    pub fn enforce_depth_limit(&mut self) {
        let dropped: usize = self
            .objectives
            .iter_mut()
            .map(|o| o.truncate(MAX_OBJECTIVE_DEPTH))
            .sum();
        if dropped > 0 {
            warn!(quest = %self.title, dropped, "objective tree exceeded depth limit");
        }
    }

    /// Number of objectives in the whole tree.
    pub fn objective_count(&self) -> usize {
        self.objectives.iter().map(Objective::count).sum()
    }
}

impl std::fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heist() -> Quest {
        Quest::new(
            "The Gilded Vault",
            "Rob the counting house",
            vec![
                Objective::new("Case the counting house").with_sub_objectives(vec![
                    Objective::new("Bribe the night watchman"),
                    Objective::new("Map the sewers"),
                ]),
                Objective::new("Crack the vault"),
            ],
        )
    }

    fn complete(text: &str) -> QuestUpdate {
        QuestUpdate {
            quest_title: "The Gilded Vault".to_string(),
            completed_objective: Some(text.to_string()),
            status: None,
        }
    }

    #[test]
    fn test_leaf_completion_promotes_parent() {
        let mut quest = heist();
        assert!(quest.apply_update(&complete("Bribe the night watchman")));
        assert!(!quest.objectives[0].completed);

        assert!(quest.apply_update(&complete("Map the sewers")));
        assert!(quest.objectives[0].completed);
        assert_eq!(quest.status, QuestStatus::Active);

        assert!(quest.apply_update(&complete("Crack the vault")));
        assert_eq!(quest.status, QuestStatus::Completed);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let mut quest = heist();
        quest.apply_update(&complete("Bribe the night watchman"));
        let snapshot = serde_json::to_string(&quest).unwrap();

        assert!(!quest.apply_update(&complete("Bribe the night watchman")));
        assert_eq!(serde_json::to_string(&quest).unwrap(), snapshot);
    }

    #[test]
    fn test_no_match_is_a_noop() {
        let mut quest = heist();
        let before = quest.clone();
        assert!(!quest.apply_update(&complete("bribe the night watchman")));
        assert_eq!(quest, before);
    }

    #[test]
    fn test_completing_parent_completes_its_steps() {
        let mut quest = heist();
        quest.apply_update(&complete("Case the counting house"));
        assert!(quest.objectives[0].is_fully_completed());

        quest.apply_update(&complete("Crack the vault"));
        assert_eq!(quest.status, QuestStatus::Completed);
        assert!(quest.objectives.iter().all(Objective::is_fully_completed));
    }

    #[test]
    fn test_explicit_status_wins() {
        let mut quest = heist();
        let mut update = complete("Case the counting house");
        update.status = Some(QuestStatus::Failed);
        quest.apply_update(&update);
        assert_eq!(quest.status, QuestStatus::Failed);

        let mut quest = heist();
        let update = QuestUpdate {
            quest_title: quest.title.clone(),
            completed_objective: None,
            status: Some(QuestStatus::Completed),
        };
        assert!(quest.apply_update(&update));
        assert_eq!(quest.status, QuestStatus::Completed);
        assert!(!quest.objectives[1].completed);
    }

    #[test]
    fn test_already_finished_quest_is_promoted() {
        let mut quest = Quest::new(
            "Pocket Money",
            "Scrounge a coin",
            vec![Objective {
                completed: true,
                ..Objective::new("Find a coin")
            }],
        );
        let update = QuestUpdate {
            quest_title: quest.title.clone(),
            completed_objective: Some("Find a coin".to_string()),
            status: None,
        };

        assert!(quest.apply_update(&update));
        assert_eq!(quest.status, QuestStatus::Completed);
        assert!(!quest.apply_update(&update));
    }

    #[test]
    fn test_failed_quest_is_not_promoted() {
        let mut quest = heist();
        quest.status = QuestStatus::Failed;
        quest.apply_update(&complete("Case the counting house"));
        quest.apply_update(&complete("Crack the vault"));
        assert_eq!(quest.status, QuestStatus::Failed);
    }

    #[test]
    fn test_depth_limit() {
        let mut node = Objective::new("level 6");
        for level in (1..=5).rev() {
            node = Objective::new(format!("level {level}")).with_sub_objectives(vec![node]);
        }
        let mut quest = Quest::new("Deep", "Too deep", vec![node]);
        assert_eq!(quest.objective_count(), 6);

        quest.enforce_depth_limit();
        assert_eq!(quest.objective_count(), MAX_OBJECTIVE_DEPTH);
    }

    #[test]
    fn test_status_wire_format() {
        let quest: Quest = serde_json::from_value(serde_json::json!({
            "title": "Lost Cat",
            "description": "Find Whiskers",
            "status": "completed",
            "objectives": [{"text": "Search the alley", "completed": true}]
        }))
        .unwrap();
        assert_eq!(quest.status, QuestStatus::Completed);
        assert!(quest.objectives[0].sub_objectives.is_empty());
    }
}
