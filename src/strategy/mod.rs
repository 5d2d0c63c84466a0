//! Pool of actions not yet executed and the selection of the next one.

mod lookahead;
mod registry;

pub use lookahead::{best_branch, Branch};
pub use registry::{build_strategy, StrategyKind};

use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use tracing::debug;

use crate::{
    action::{Action, WaitAction},
    configuration::StrategyConfig,
    context::GameContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// highest weight first
    #[default]
    Greedy,
    /// simulated search over action sequences
    Lookahead,
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "greedy" => Ok(SelectionMode::Greedy),
            "lookahead" | "goap" => Ok(SelectionMode::Lookahead),
            other => Err(format!("unknown selection mode {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    actions: Vec<Action>,
    mode: SelectionMode,
    depth: usize,
    can_wait: bool,
    wait_delay: Duration,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            actions: vec![],
            mode: SelectionMode::Greedy,
            depth: 3,
            can_wait: false,
            wait_delay: Duration::from_secs(2),
        }
    }
}

impl Strategy {
    pub fn new(actions: Vec<Action>, config: &StrategyConfig) -> Self {
        Self {
            actions,
            mode: config.selection,
            depth: config.goap_depth,
            can_wait: config.can_wait,
            wait_delay: Duration::from_millis(config.wait_delay_ms),
        }
    }

    pub fn with_mode(mut self, mode: SelectionMode, depth: usize) -> Self {
        self.mode = mode;
        self.depth = depth;
        self
    }

    pub fn with_can_wait(mut self, can_wait: bool) -> Self {
        self.can_wait = can_wait;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Remove every action from the pool.
    pub fn drain(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Action {
        self.actions.remove(index)
    }

    /// Re-arm every recycled action.
    pub fn amnesty(&mut self) {
        for action in self.actions.iter_mut() {
            action.recycled = false;
        }
    }

    pub fn is_eligible(action: &Action, game: &GameContext) -> bool {
        !action.recycled && action.weight(game) > 0.0
    }

    /// Eligible action with the highest weight, last one on ties.
    pub fn greedy_index(&self, game: &GameContext) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, action) in self.actions.iter().enumerate() {
            if action.recycled {
                continue;
            }
            let weight = action.weight(game);
            if weight <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, best_weight)| weight >= best_weight) {
                best = Some((index, weight));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Remove and return the action to run next.
    pub fn get_next_action(&mut self, game: &GameContext) -> Option<Action> {
        let index = match self.mode {
            SelectionMode::Greedy => self.greedy_index(game),
            SelectionMode::Lookahead if self.depth == 0 => self.greedy_index(game),
            SelectionMode::Lookahead => best_branch(self, game, self.depth).map(|branch| {
                debug!(
                    "Lookahead picked {:?} for a score of {}",
                    branch.actions, branch.score
                );
                branch.first
            }),
        };
        match index {
            Some(index) => Some(self.remove(index)),
            None if self.can_wait => {
                debug!("No eligible action, waiting");
                Some(WaitAction::action(self.wait_delay))
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::ScoredAction, configuration::GameConfig};

    fn game() -> GameContext {
        GameContext::new(1, &GameConfig::default())
    }

    fn scored(name: &str, weight: f64) -> Action {
        Action::new(name, ScoredAction::new(weight, 1))
    }

    #[test]
    fn greedy_picks_last_of_tied_weights() {
        let mut strategy = Strategy::default();
        strategy.push(scored("a", 1.0));
        strategy.push(scored("b", 5.0));
        strategy.push(scored("c", 5.0));
        let game = game();
        assert_eq!(strategy.get_next_action(&game).unwrap().name, "c");
        assert_eq!(strategy.get_next_action(&game).unwrap().name, "b");
        assert_eq!(strategy.get_next_action(&game).unwrap().name, "a");
        assert!(strategy.get_next_action(&game).is_none());
    }

    #[test]
    fn greedy_is_deterministic() {
        let mut strategy = Strategy::default();
        for (name, weight) in [("a", 3.0), ("b", 7.0), ("c", 7.0), ("d", 0.0)] {
            strategy.push(scored(name, weight));
        }
        let game = game();
        let first: Vec<_> = (0..3)
            .map(|_| strategy.clone().get_next_action(&game).unwrap().name)
            .collect();
        assert_eq!(first, vec!["c", "c", "c"]);
    }

    #[test]
    fn recycled_and_zero_weight_are_skipped() {
        let mut strategy = Strategy::default();
        let mut recycled = scored("recycled", 10.0);
        recycled.recycled = true;
        strategy.push(recycled);
        strategy.push(scored("zero", 0.0));
        let game = game();
        assert!(strategy.get_next_action(&game).is_none());
        assert_eq!(strategy.len(), 2);

        strategy.amnesty();
        assert_eq!(strategy.get_next_action(&game).unwrap().name, "recycled");
    }

    #[test]
    fn can_wait_returns_wait_action() {
        let mut strategy = Strategy::default().with_can_wait(true);
        let action = strategy.get_next_action(&game()).unwrap();
        assert_eq!(action.name, WaitAction::NAME);
        assert!(action.poses.is_empty());
    }
}
