//! Actions the strategy schedules and the planner executes.

mod builtin;
mod execution;

pub use builtin::{ParkingAction, PatrolAction, ScoredAction, WaitAction};
pub use execution::{ActuatorCommand, ExecutionContext, ExecutionMode};

use std::{collections::VecDeque, fmt, sync::Arc, time::Duration};

use crate::{context::GameContext, pose::PathPose, strategy::Strategy};

/// State a hook may read and mutate.
pub struct HookContext<'a> {
    pub game: &'a mut GameContext,
    pub execution: &'a mut ExecutionContext,
    /// pool of actions not yet executed, the running action is not in it
    pub strategy: &'a mut Strategy,
}

pub type PoseHook = Arc<dyn Fn(&mut HookContext<'_>) + Send + Sync>;

/// One pose of an action with its optional hooks.
#[derive(Clone)]
pub struct ActionPose {
    pub pose: PathPose,
    pub before: Option<PoseHook>,
    pub after: Option<PoseHook>,
    /// run each time a new avoidance path toward this pose is accepted
    pub intermediate: Option<PoseHook>,
}

impl ActionPose {
    pub fn new(pose: PathPose) -> Self {
        Self {
            pose,
            before: None,
            after: None,
            intermediate: None,
        }
    }

    pub fn with_before(mut self, hook: impl Fn(&mut HookContext<'_>) + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn with_after(mut self, hook: impl Fn(&mut HookContext<'_>) + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    pub fn with_intermediate(
        mut self,
        hook: impl Fn(&mut HookContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.intermediate = Some(Arc::new(hook));
        self
    }

    pub fn before_pose(&self, context: &mut HookContext<'_>) {
        if let Some(hook) = &self.before {
            hook(context);
        }
    }

    pub fn after_pose(&self, context: &mut HookContext<'_>) {
        if let Some(hook) = &self.after {
            hook(context);
        }
    }

    pub fn intermediate_pose(&self, context: &mut HookContext<'_>) {
        if let Some(hook) = &self.intermediate {
            hook(context);
        }
    }
}

impl fmt::Debug for ActionPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPose")
            .field("pose", &self.pose)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("intermediate", &self.intermediate.is_some())
            .finish()
    }
}

/// What makes an action specific: its weight and its action level hooks.
///
/// Weight must be a pure function of the game context, the lookahead calls it
/// on cloned state.
pub trait ActionBehavior: Send + Sync {
    fn weight(&self, game: &GameContext) -> f64;

    fn before_action(&mut self, _context: &mut HookContext<'_>) {}

    fn after_action(&mut self, _context: &mut HookContext<'_>) {}

    /// Roll back side effects of an interrupted run.
    fn recycle(&mut self, _context: &mut HookContext<'_>) {}

    fn clone_box(&self) -> Box<dyn ActionBehavior>;
}

impl Clone for Box<dyn ActionBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Result of a simulated run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// mm travelled through the action poses
    pub distance: f64,
    /// time slept by hooks
    pub hook_time: Duration,
}

#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub poses: VecDeque<ActionPose>,
    pub interruptable: bool,
    pub recycled: bool,
    behavior: Box<dyn ActionBehavior>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("poses", &self.poses.len())
            .field("interruptable", &self.interruptable)
            .field("recycled", &self.recycled)
            .finish()
    }
}

impl Action {
    pub fn new(name: &str, behavior: impl ActionBehavior + 'static) -> Self {
        Self {
            name: name.to_owned(),
            poses: VecDeque::new(),
            interruptable: true,
            recycled: false,
            behavior: Box::new(behavior),
        }
    }

    pub fn with_pose(mut self, pose: ActionPose) -> Self {
        self.poses.push_back(pose);
        self
    }

    pub fn with_poses(mut self, poses: impl IntoIterator<Item = PathPose>) -> Self {
        self.poses.extend(poses.into_iter().map(ActionPose::new));
        self
    }

    pub fn with_interruptable(mut self, interruptable: bool) -> Self {
        self.interruptable = interruptable;
        self
    }

    pub fn weight(&self, game: &GameContext) -> f64 {
        self.behavior.weight(game)
    }

    pub fn pop_pose(&mut self) -> Option<ActionPose> {
        self.poses.pop_front()
    }

    pub fn before_action(&mut self, context: &mut HookContext<'_>) {
        self.behavior.before_action(context);
    }

    pub fn after_action(&mut self, context: &mut HookContext<'_>) {
        self.behavior.after_action(context);
    }

    /// Mark the action as interrupted so it is skipped until the next amnesty.
    pub fn recycle(&mut self, context: &mut HookContext<'_>) {
        self.recycled = true;
        self.behavior.recycle(context);
    }

    /// Run the whole action on the given state without touching the robot.
    pub fn evaluate(mut self, game: &mut GameContext, strategy: &mut Strategy) -> Evaluation {
        let mut execution = ExecutionContext::simulated();
        let mut distance = 0.0;
        {
            let mut context = HookContext {
                game,
                execution: &mut execution,
                strategy,
            };
            self.before_action(&mut context);
            while let Some(pose) = self.pop_pose() {
                pose.before_pose(&mut context);
                distance += context.game.pose_current.distance_to(&pose.pose.pose);
                context.game.pose_current = pose.pose.pose;
                pose.after_pose(&mut context);
            }
            self.after_action(&mut context);
            context.strategy.amnesty();
        }
        Evaluation {
            distance,
            hook_time: execution.virtual_time(),
        }
    }
}
