use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    lock::WriterPriorityLock,
    seqlock::{Record, SharedRecord},
};
use crate::{
    avoidance::AvoidanceStrategy, context::TableBounds, obstacle::Obstacle, pose::PathPose,
    pose::Pose,
};

const FLAG_PRESENT: u64 = 1;
const FLAG_ALLOW_REVERSE: u64 = 1 << 1;
const FLAG_BYPASS_ANTI_BLOCKING: u64 = 1 << 2;
const FLAG_BYPASS_FINAL_ORIENTATION: u64 = 1 << 3;
const FLAG_INTERMEDIATE: u64 = 1 << 4;

impl Record<3> for Pose {
    fn encode(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.orientation.to_bits()]
    }

    fn decode(words: &[u64; 3]) -> Self {
        Pose::new(
            f64::from_bits(words[0]),
            f64::from_bits(words[1]),
            f64::from_bits(words[2]),
        )
    }
}

/// Pose order record: flags, x, y, orientation, linear speed, angular speed, timeout.
impl Record<7> for Option<PathPose> {
    fn encode(&self) -> [u64; 7] {
        let Some(pose) = self else {
            return [0; 7];
        };
        let mut flags = FLAG_PRESENT;
        for (set, flag) in [
            (pose.allow_reverse, FLAG_ALLOW_REVERSE),
            (pose.bypass_anti_blocking, FLAG_BYPASS_ANTI_BLOCKING),
            (pose.bypass_final_orientation, FLAG_BYPASS_FINAL_ORIENTATION),
            (pose.is_intermediate, FLAG_INTERMEDIATE),
        ] {
            if set {
                flags |= flag;
            }
        }
        [
            flags,
            pose.pose.x.to_bits(),
            pose.pose.y.to_bits(),
            pose.pose.orientation.to_bits(),
            pose.max_speed_linear.to_bits(),
            pose.max_speed_angular.to_bits(),
            pose.timeout_ms as u64,
        ]
    }

    fn decode(words: &[u64; 7]) -> Self {
        let flags = words[0];
        if flags & FLAG_PRESENT == 0 {
            return None;
        }
        Some(PathPose {
            pose: Pose::new(
                f64::from_bits(words[1]),
                f64::from_bits(words[2]),
                f64::from_bits(words[3]),
            ),
            max_speed_linear: f64::from_bits(words[4]),
            max_speed_angular: f64::from_bits(words[5]),
            allow_reverse: flags & FLAG_ALLOW_REVERSE != 0,
            bypass_anti_blocking: flags & FLAG_BYPASS_ANTI_BLOCKING != 0,
            timeout_ms: words[6] as u32,
            bypass_final_orientation: flags & FLAG_BYPASS_FINAL_ORIENTATION != 0,
            is_intermediate: flags & FLAG_INTERMEDIATE != 0,
        })
    }
}

impl Record<4> for TableBounds {
    fn encode(&self) -> [u64; 4] {
        [
            self.x_min.to_bits(),
            self.x_max.to_bits(),
            self.y_min.to_bits(),
            self.y_max.to_bits(),
        ]
    }

    fn decode(words: &[u64; 4]) -> Self {
        TableBounds {
            x_min: f64::from_bits(words[0]),
            x_max: f64::from_bits(words[1]),
            y_min: f64::from_bits(words[2]),
            y_max: f64::from_bits(words[3]),
        }
    }
}

/// Scalar configuration and state shared with the avoidance worker.
pub struct SharedProperties {
    robot_id: u8,
    avoidance_strategy: AtomicU8,
    path_refresh_interval_ms: AtomicU64,
    table: SharedRecord<TableBounds, 4>,
    exiting: AtomicBool,
}

impl SharedProperties {
    pub fn robot_id(&self) -> u8 {
        self.robot_id
    }

    pub fn avoidance_strategy(&self) -> AvoidanceStrategy {
        AvoidanceStrategy::from_u8(self.avoidance_strategy.load(Ordering::Acquire))
    }

    pub fn set_avoidance_strategy(&self, strategy: AvoidanceStrategy) {
        self.avoidance_strategy
            .store(strategy as u8, Ordering::Release);
    }

    pub fn path_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.path_refresh_interval_ms.load(Ordering::Acquire))
    }

    pub fn set_path_refresh_interval(&self, interval: Duration) {
        self.path_refresh_interval_ms
            .store(interval.as_millis() as u64, Ordering::Release);
    }

    pub fn table(&self) -> TableBounds {
        self.table.load()
    }

    pub fn set_table(&self, table: &TableBounds) {
        self.table.store(table);
    }

    pub fn exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    pub fn set_exiting(&self, exiting: bool) {
        self.exiting.store(exiting, Ordering::Release);
    }
}

/// Region shared between the planner and the avoidance worker.
///
/// Pose current has a single writer (motion feedback), pose order has a single
/// writer (planner) and a single reader (avoidance). Obstacle lists are written
/// by perception and the planner's obstacle projection, read by avoidance.
pub struct SharedMemory {
    pub properties: SharedProperties,
    pose_current: SharedRecord<Pose, 3>,
    pose_order: SharedRecord<Option<PathPose>, 7>,
    has_new_pose_order: AtomicBool,
    last_pose_invalidated: AtomicBool,
    detector_obstacles: WriterPriorityLock<Vec<Obstacle>>,
    monitor_obstacles: WriterPriorityLock<Vec<Obstacle>>,
    obstacles: WriterPriorityLock<Vec<Obstacle>>,
}

impl SharedMemory {
    pub fn new(
        robot_id: u8,
        avoidance_strategy: AvoidanceStrategy,
        path_refresh_interval: Duration,
        table: TableBounds,
    ) -> Self {
        Self {
            properties: SharedProperties {
                robot_id,
                avoidance_strategy: AtomicU8::new(avoidance_strategy as u8),
                path_refresh_interval_ms: AtomicU64::new(path_refresh_interval.as_millis() as u64),
                table: SharedRecord::new(&table),
                exiting: AtomicBool::new(false),
            },
            pose_current: SharedRecord::new(&Pose::default()),
            pose_order: SharedRecord::new(&None),
            has_new_pose_order: AtomicBool::new(false),
            last_pose_invalidated: AtomicBool::new(false),
            detector_obstacles: WriterPriorityLock::new(vec![]),
            monitor_obstacles: WriterPriorityLock::new(vec![]),
            obstacles: WriterPriorityLock::new(vec![]),
        }
    }

    pub fn pose_current(&self) -> Pose {
        self.pose_current.load()
    }

    pub fn set_pose_current(&self, pose: &Pose) {
        self.pose_current.store(pose);
    }

    pub fn pose_order(&self) -> Option<PathPose> {
        self.pose_order.load()
    }

    /// Publish a new pose order. The avoidance worker picks it up on its next cycle.
    pub fn set_pose_order(&self, pose_order: Option<PathPose>) {
        self.pose_order.store(&pose_order);
        self.has_new_pose_order.store(true, Ordering::Release);
    }

    pub fn has_new_pose_order(&self) -> bool {
        self.has_new_pose_order.load(Ordering::Acquire)
    }

    /// Take the pending pose order if one was published since the last call.
    pub fn take_new_pose_order(&self) -> Option<Option<PathPose>> {
        if self.has_new_pose_order.swap(false, Ordering::AcqRel) {
            Some(self.pose_order.load())
        } else {
            None
        }
    }

    /// Ask the avoidance worker to forget the pose it last computed a path from.
    pub fn invalidate_last_pose(&self) {
        self.last_pose_invalidated.store(true, Ordering::Release);
    }

    pub fn take_last_pose_invalidated(&self) -> bool {
        self.last_pose_invalidated.swap(false, Ordering::AcqRel)
    }

    pub fn set_detector_obstacles(&self, obstacles: Vec<Obstacle>) {
        *self.detector_obstacles.write() = obstacles;
        self.merge_obstacles();
    }

    /// Ground truth obstacles from the monitor. When not empty they replace detector obstacles.
    pub fn set_monitor_obstacles(&self, obstacles: Vec<Obstacle>) {
        *self.monitor_obstacles.write() = obstacles;
        self.merge_obstacles();
    }

    fn merge_obstacles(&self) {
        let monitor = self.monitor_obstacles.snapshot();
        let merged = if monitor.is_empty() {
            self.detector_obstacles.snapshot()
        } else {
            monitor
        };
        let (valid, invalid): (Vec<_>, Vec<_>) =
            merged.into_iter().partition(|o| o.validate().is_ok());
        if !invalid.is_empty() {
            warn!("Dropping {} malformed obstacles", invalid.len());
        }
        debug!("Merged obstacle set has {} obstacles", valid.len());
        *self.obstacles.write() = valid;
    }

    /// Deep copy of the merged obstacle set.
    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.obstacles.snapshot()
    }

    pub fn clear_obstacles(&self) {
        self.detector_obstacles.write().clear();
        self.monitor_obstacles.write().clear();
        self.obstacles.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::Vertex;

    fn memory() -> SharedMemory {
        SharedMemory::new(
            1,
            AvoidanceStrategy::NativeSolver,
            Duration::from_millis(200),
            TableBounds::default(),
        )
    }

    #[test]
    fn pose_order_record_round_trips_flags() {
        let order = PathPose::new(10.0, 20.0, 30.0)
            .with_allow_reverse(false)
            .with_timeout_ms(1500)
            .intermediate();
        let words = Some(order).encode();
        assert_eq!(Option::<PathPose>::decode(&words), Some(order));
        assert_eq!(Option::<PathPose>::decode(&Option::<PathPose>::None.encode()), None);
    }

    #[test]
    fn new_pose_order_is_taken_once() {
        let memory = memory();
        assert!(memory.take_new_pose_order().is_none());
        memory.set_pose_order(Some(PathPose::new(1.0, 2.0, 3.0)));
        assert_eq!(
            memory.take_new_pose_order(),
            Some(Some(PathPose::new(1.0, 2.0, 3.0)))
        );
        assert!(memory.take_new_pose_order().is_none());
    }

    #[test]
    fn monitor_obstacles_override_detector() {
        let memory = memory();
        let detected = Obstacle::circle(Vertex::new(0.0, 0.0), 100.0, 200.0, 8);
        let monitored = Obstacle::circle(Vertex::new(500.0, 0.0), 100.0, 200.0, 8);
        memory.set_detector_obstacles(vec![detected.clone()]);
        assert_eq!(memory.obstacles(), vec![detected.clone()]);
        memory.set_monitor_obstacles(vec![monitored.clone()]);
        assert_eq!(memory.obstacles(), vec![monitored]);
        memory.set_monitor_obstacles(vec![]);
        assert_eq!(memory.obstacles(), vec![detected]);
    }

    #[test]
    fn properties_are_shared() {
        let memory = memory();
        memory
            .properties
            .set_avoidance_strategy(AvoidanceStrategy::StopAndGo);
        assert_eq!(
            memory.properties.avoidance_strategy(),
            AvoidanceStrategy::StopAndGo
        );
        memory
            .properties
            .set_path_refresh_interval(Duration::from_millis(100));
        assert_eq!(
            memory.properties.path_refresh_interval(),
            Duration::from_millis(100)
        );
    }
}
