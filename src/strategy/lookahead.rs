//! Depth bounded search over simulated action sequences.
//!
//! Every branch runs on clones of the pool and of the game context, so the
//! real state is never touched. Logging is silenced while simulating.

use tracing::subscriber::{with_default, NoSubscriber};

use super::Strategy;
use crate::context::GameContext;

/// Best sequence found by the search.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// index in the pool of the first action of the sequence
    pub first: usize,
    pub first_weight: f64,
    pub score: i32,
    pub actions: Vec<String>,
}

impl Branch {
    fn better_than(&self, other: &Branch) -> bool {
        (self.score, self.first_weight) > (other.score, other.first_weight)
    }
}

/// Search up to `depth` actions ahead and return the best branch.
pub fn best_branch(strategy: &Strategy, game: &GameContext, depth: usize) -> Option<Branch> {
    let mut best = None;
    with_default(NoSubscriber::default(), || {
        let mut taken = vec![];
        explore(strategy, game, depth, None, &mut taken, &mut best);
    });
    best
}

fn explore(
    strategy: &Strategy,
    game: &GameContext,
    depth: usize,
    first: Option<(usize, f64)>,
    taken: &mut Vec<String>,
    best: &mut Option<Branch>,
) -> bool {
    if depth == 0 || game.countdown <= 0.0 {
        return false;
    }
    let mut explored = false;
    for (index, action) in strategy.iter().enumerate() {
        let weight = action.weight(game);
        if weight <= 0.0 {
            continue;
        }
        if action.recycled && taken.is_empty() {
            continue;
        }

        let mut branch_strategy = strategy.clone();
        let mut branch_game = game.clone();
        let action = branch_strategy.remove(index);
        let name = action.name.clone();
        let evaluation = action.evaluate(&mut branch_game, &mut branch_strategy);
        let travel_time = if branch_game.average_speed > 0.0 {
            evaluation.distance / branch_game.average_speed
        } else {
            0.0
        };
        branch_game.countdown -= evaluation.hook_time.as_secs_f64() + travel_time;
        if branch_game.countdown < 0.0 {
            // does not fit in the remaining game time
            continue;
        }
        explored = true;

        let first = first.unwrap_or((index, weight));
        taken.push(name);
        let deeper = explore(
            &branch_strategy,
            &branch_game,
            depth - 1,
            Some(first),
            taken,
            best,
        );
        if !deeper {
            let leaf = Branch {
                first: first.0,
                first_weight: first.1,
                score: branch_game.score,
                actions: taken.clone(),
            };
            if best.as_ref().map_or(true, |current| leaf.better_than(current)) {
                *best = Some(leaf);
            }
        }
        taken.pop();
    }
    explored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::{Action, ActionPose, PatrolAction, ScoredAction},
        configuration::GameConfig,
        pose::{PathPose, Pose},
        strategy::SelectionMode,
    };
    use std::time::Duration;

    fn game() -> GameContext {
        let mut game = GameContext::new(1, &GameConfig::default());
        game.pose_current = Pose::new(0.0, 0.0, 0.0);
        game.average_speed = 100.0;
        game.score = 0;
        game
    }

    fn visit(name: &str, weight: f64, score: i32, x: f64) -> Action {
        Action::new(name, ScoredAction::new(weight, score))
            .with_poses([PathPose::new(x, 0.0, 0.0)])
    }

    #[test]
    fn prefers_sequence_with_better_score() {
        // "bait" has the best weight but does not fit in the game
        let mut strategy = Strategy::default().with_mode(SelectionMode::Lookahead, 2);
        strategy.push(visit("bait", 10.0, 3, 0.0).with_pose(
            ActionPose::new(PathPose::new(0.0, 0.0, 0.0)).with_after(|context| {
                context.execution.sleep(Duration::from_secs(200));
            }),
        ));
        strategy.push(visit("first", 5.0, 2, 100.0));
        strategy.push(visit("second", 1.0, 2, 200.0));

        let best = best_branch(&strategy, &game(), 2).unwrap();
        assert_eq!(best.score, 4);
        assert_eq!(best.actions, vec!["first", "second"]);

        let chosen = strategy.get_next_action(&game()).unwrap();
        assert_eq!(chosen.name, "first");
    }

    #[test]
    fn ties_keep_first_found_and_use_weight() {
        let mut strategy = Strategy::default().with_mode(SelectionMode::Lookahead, 1);
        strategy.push(visit("a", 1.0, 5, 100.0));
        strategy.push(visit("b", 2.0, 5, 100.0));
        strategy.push(visit("c", 2.0, 5, 100.0));
        let best = best_branch(&strategy, &game(), 1).unwrap();
        assert_eq!(best.actions, vec!["b"]);
        assert_eq!(best.first, 1);
    }

    #[test]
    fn search_terminates_on_countdown() {
        let mut strategy = Strategy::default();
        for i in 0..6 {
            strategy.push(visit(&format!("far {i}"), 1.0, 1, 300.0 * (i + 1) as f64));
        }
        let mut game = game();
        // moves cost at least 3 s, only one fits
        game.countdown = 5.0;
        let best = best_branch(&strategy, &game, 6).unwrap();
        assert_eq!(best.actions, vec!["far 0"]);
    }

    #[test]
    fn self_requeueing_action_is_bounded_by_depth() {
        let mut strategy = Strategy::default();
        strategy.push(PatrolAction::action(
            "Back and forth",
            vec![PathPose::new(-500.0, 0.0, 0.0), PathPose::new(500.0, 0.0, 0.0)],
        ));
        let mut game = game();
        game.countdown = 100_000.0;
        for depth in [1, 4] {
            let best = best_branch(&strategy, &game, depth).unwrap();
            assert_eq!(best.actions.len(), depth);
            assert_eq!(best.actions[0], "Back and forth");
        }
    }

    #[test]
    fn real_state_is_untouched() {
        let mut strategy = Strategy::default();
        strategy.push(visit("a", 1.0, 5, 100.0));
        let game = game();
        best_branch(&strategy, &game, 3);
        assert_eq!(strategy.len(), 1);
        assert_eq!(game.score, 0);
        assert_eq!(game.pose_current, Pose::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn recycled_actions_skipped_at_root_only() {
        let mut strategy = Strategy::default();
        let mut recycled = visit("recycled", 10.0, 10, 100.0);
        recycled.recycled = true;
        strategy.push(recycled);
        strategy.push(visit("fresh", 1.0, 1, 100.0));
        let best = best_branch(&strategy, &game(), 2).unwrap();
        // completing "fresh" re-arms the recycled action
        assert_eq!(best.actions, vec!["fresh", "recycled"]);
        assert_eq!(best.first, 1);
    }
}
