//! A drawing session: everything one client holds for one attached scene.
//!
//! Built on attach from the host's collaborators and torn down on detach.
//! The host feeds pointer samples and timer ticks in, calls [`DrawingSession::pump`]
//! to exchange messages, and paints [`DrawingSession::display_list`].
//!
//! Neither `pump` nor `tick` touches the permanent store. Permanent drawings
//! are only persisted when the host awaits [`DrawingSession::flush_store`],
//! typically after every operation that can change them (commit, undo,
//! clear, delete). A host that never flushes never persists.

use std::sync::Arc;

use kurbo::Point;

use crate::camera::Camera;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::entity::EntityId;
use crate::geometry::DisplayList;
use crate::grid::GridDescriptor;
use crate::identity::User;
use crate::inspector::Inspector;
use crate::lifecycle::{ClearScope, DrawError, EntityManager, StoreWrite};
use crate::protocol::Replicator;
use crate::storage::{PermanentStore, PreferenceStore, SceneStore};
use crate::sync::BroadcastChannel;
use crate::tools::ToolSession;

/// Collaborators the host provides when attaching to a scene.
pub struct SessionHost {
    pub user: User,
    pub scene_id: String,
    pub grid: GridDescriptor,
    pub channel: Box<dyn BroadcastChannel>,
    pub store: Arc<dyn SceneStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub clock: Arc<dyn Clock>,
    pub config: SessionConfig,
}

/// User-visible message for the host to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
}

pub struct DrawingSession {
    scene_id: String,
    camera: Camera,
    tools: ToolSession,
    manager: EntityManager,
    replicator: Option<Replicator>,
    store: PermanentStore,
    notices: Vec<Notice>,
}

impl DrawingSession {
    /// Attach to a scene. Stored permanent drawings are replayed before any channel traffic is read.
    pub async fn attach(host: SessionHost) -> Self {
        let SessionHost {
            user,
            scene_id,
            grid,
            channel,
            store,
            preferences,
            clock,
            config,
        } = host;

        let store = PermanentStore::new(store, scene_id.clone(), config.store_key.clone());
        let tools = ToolSession::new(user.id.clone(), preferences);
        let replicator = Replicator::new(channel, user.id.clone());
        let mut manager = EntityManager::new(user, grid, config, clock);

        let stored = store.load().await;
        let count = stored.len();
        for entity in stored {
            manager.reconstruct(entity);
        }
        log::info!("attached to scene {} ({} permanent drawings)", scene_id, count);

        Self {
            scene_id,
            camera: Camera::new(),
            tools,
            manager,
            replicator: Some(replicator),
            store,
            notices: Vec::new(),
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn user(&self) -> &User {
        self.manager.user()
    }

    pub fn is_attached(&self) -> bool {
        self.replicator.is_some()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn tools(&self) -> &ToolSession {
        &self.tools
    }

    /// Tool settings. Drafts a mode switch completes are committed on the next pump.
    pub fn tools_mut(&mut self) -> &mut ToolSession {
        &mut self.tools
    }

    pub fn entities(&self) -> &EntityManager {
        &self.manager
    }

    pub fn activate(&mut self) {
        self.tools.activate();
    }

    pub fn deactivate(&mut self) {
        self.tools.deactivate();
        self.commit_completed();
    }

    pub fn arm(&mut self) {
        self.tools.arm();
    }

    pub fn disarm(&mut self) {
        self.tools.disarm();
        self.commit_completed();
    }

    pub fn cancel(&mut self) {
        self.tools.cancel();
    }

    fn map_sample(&self, sample: Point) -> Option<Point> {
        let world = self.camera.world_coordinates(sample);
        if world.is_none() {
            log::trace!("dropping pointer sample {:?}", sample);
        }
        world
    }

    /// Pointer samples are in device space.
    pub fn pointer_down(&mut self, sample: Point) {
        if let Some(point) = self.map_sample(sample) {
            self.tools.pointer_down(point);
            self.commit_completed();
        }
    }

    pub fn pointer_move(&mut self, sample: Point) {
        if let Some(point) = self.map_sample(sample) {
            self.tools.pointer_move(point);
        }
    }

    pub fn pointer_up(&mut self, sample: Point) {
        if let Some(point) = self.map_sample(sample) {
            self.tools.pointer_up(point);
            self.commit_completed();
        }
    }

    fn commit_completed(&mut self) {
        for draft in self.tools.take_completed() {
            self.manager
                .finalize(draft, self.tools.timed_erase(), self.tools.permanent_mode());
        }
        self.flush_outgoing();
    }

    fn flush_outgoing(&mut self) {
        let outgoing = self.manager.take_outgoing();
        let Some(replicator) = self.replicator.as_mut() else {
            return;
        };
        for msg in &outgoing {
            replicator.broadcast(msg);
        }
    }

    /// Commit finished drafts, send pending messages and apply everything received.
    /// Returns how many inbound messages changed the scene.
    pub fn pump(&mut self) -> usize {
        self.commit_completed();
        let Some(replicator) = self.replicator.as_mut() else {
            return 0;
        };
        let received = replicator.poll();
        received
            .into_iter()
            .map(|msg| self.manager.apply_message(msg))
            .filter(|changed| *changed)
            .count()
    }

    fn report<T>(&mut self, result: Result<T, DrawError>) -> Result<T, DrawError> {
        if let Err(e @ DrawError::Unauthorized(_)) = &result {
            log::warn!("{} rejected: {}", self.manager.user().id, e);
            self.notices.push(Notice::Warning(e.to_string()));
        }
        self.flush_outgoing();
        result
    }

    pub fn undo(&mut self) -> Result<EntityId, DrawError> {
        let result = self.manager.undo(self.tools.permanent_mode());
        self.report(result)
    }

    pub fn clear(&mut self, scope: ClearScope) -> Result<usize, DrawError> {
        let result = self.manager.clear(scope);
        self.report(result)
    }

    pub fn delete_by_id(&mut self, id: &str) -> Result<bool, DrawError> {
        let result = self.manager.delete_by_id(id);
        self.report(result)
    }

    /// Timer callback: runs due expiration sweeps and advances fades.
    pub fn tick(&mut self) -> usize {
        self.manager.tick()
    }

    /// Execute the pending permanent-store write, if any. Failures are logged.
    pub async fn flush_store(&mut self) {
        match self.manager.take_store_write() {
            Some(StoreWrite::Save(entities)) => self.store.save(&entities).await,
            Some(StoreWrite::Clear) => self.store.clear().await,
            None => {}
        }
    }

    /// Committed layer plus the live preview, in world space.
    pub fn display_list(&self) -> DisplayList {
        let mut list = self.manager.display_list();
        list.append_faded(&self.tools.preview(self.manager.grid()), 1.0);
        list
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Inspector over both collections. Deletions made through it go out on the next pump.
    pub fn inspector(&mut self) -> Inspector<'_> {
        Inspector::new(&mut self.manager)
    }

    /// Drop the gesture, fade every drawing out locally and leave the channel.
    /// The store is not touched. Fades keep running through [`DrawingSession::tick`].
    pub fn detach(&mut self) {
        self.tools.cancel();
        self.manager.teardown();
        self.replicator = None;
        log::info!("detached from scene {}", self.scene_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DEFAULT_STORE_KEY;
    use crate::entity::{Geometry, Owner, StrokeSpec, VectorEntity};
    use crate::geometry::{LineStyle, Rgba};
    use crate::protocol::{Deletion, DrawMessage};
    use crate::storage::{MemoryPreferences, MemoryStore, block_on};
    use crate::sync::LocalHub;
    use crate::tools::ToolMode;
    use std::time::Duration;

    struct Fixture {
        hub: LocalHub,
        store: Arc<MemoryStore>,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                hub: LocalHub::new(),
                store: Arc::new(MemoryStore::new()),
                clock: ManualClock::new(10_000),
            }
        }

        fn join(&self, user: User) -> DrawingSession {
            block_on(DrawingSession::attach(SessionHost {
                user,
                scene_id: "scene-1".to_string(),
                grid: GridDescriptor::default(),
                channel: Box::new(self.hub.channel()),
                store: self.store.clone(),
                preferences: Arc::new(MemoryPreferences::new()),
                clock: Arc::new(self.clock.clone()),
                config: SessionConfig::default(),
            }))
        }
    }

    fn draw_box(session: &mut DrawingSession, from: Point, to: Point) {
        session.tools_mut().set_mode(ToolMode::Box);
        session.activate();
        session.arm();
        session.pointer_move(from);
        session.pointer_move(to);
        session.disarm();
    }

    #[test]
    fn test_sketch_replicates() {
        let fx = Fixture::new();
        let mut alice = fx.join(User::participant("alice", "Alice"));
        let mut bob = fx.join(User::participant("bob", "Bob"));

        let tools = alice.tools_mut();
        tools.set_mode(ToolMode::Sketch);
        tools.set_brush_width(6.0);
        tools.set_brush_color(Rgba::BLACK);
        tools.set_line_style(LineStyle::Solid);
        alice.activate();
        alice.arm();
        alice.pointer_move(Point::new(50.0, 50.0));
        alice.pointer_move(Point::new(60.0, 50.0));
        alice.pointer_move(Point::new(60.0, 60.0));
        alice.disarm();

        let [sent] = alice.entities().ephemeral() else {
            panic!("expected one sketch");
        };
        assert_eq!(
            sent.geometry,
            Geometry::Sketch {
                origin: Point::new(50.0, 50.0),
                points: vec![Point::ZERO, Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            }
        );
        assert_eq!(sent.stroke.width, 6.0);
        assert_eq!(sent.stroke.color, Rgba::BLACK);

        assert_eq!(bob.pump(), 1);
        assert_eq!(bob.entities().ephemeral(), alice.entities().ephemeral());
        assert_eq!(alice.pump(), 0);
    }

    #[test]
    fn test_pointer_samples_mapped_through_camera() {
        let fx = Fixture::new();
        let mut alice = fx.join(User::participant("alice", "Alice"));
        alice.camera_mut().zoom = 2.0;
        draw_box(&mut alice, Point::new(20.0, 20.0), Point::new(60.0, 40.0));
        let [entity] = alice.entities().ephemeral() else {
            panic!("expected one box");
        };
        assert_eq!(
            entity.geometry,
            Geometry::Box {
                origin: Point::new(10.0, 10.0),
                width: 20.0,
                height: 10.0,
            }
        );
    }

    #[test]
    fn test_degenerate_transform_drops_samples() {
        let fx = Fixture::new();
        let mut alice = fx.join(User::participant("alice", "Alice"));
        alice.camera_mut().zoom = 0.0;
        draw_box(&mut alice, Point::new(20.0, 20.0), Point::new(60.0, 40.0));
        assert!(alice.entities().is_empty());
    }

    #[test]
    fn test_permanent_round_trip_through_store() {
        let fx = Fixture::new();
        let mut gm = fx.join(User::moderator("gm", "GM"));
        let tools = gm.tools_mut();
        tools.set_brush_color(Rgba::RED);
        tools.set_line_style(LineStyle::Dashed);
        tools.set_permanent_mode(true);
        draw_box(&mut gm, Point::new(100.0, 100.0), Point::new(150.0, 130.0));
        block_on(gm.flush_store());

        let fresh = fx.join(User::participant("p1", "P1"));
        let [entity] = fresh.entities().permanent() else {
            panic!("expected one permanent box");
        };
        assert_eq!(
            entity.geometry,
            Geometry::Box {
                origin: Point::new(100.0, 100.0),
                width: 50.0,
                height: 30.0,
            }
        );
        assert_eq!(entity.stroke.color, Rgba::RED);
        assert_eq!(entity.stroke.line_style, LineStyle::Dashed);
        assert!(entity.permanent);
        assert_eq!(&gm.entities().permanent()[0], entity);
    }

    #[test]
    fn test_attach_sanitizes_stored_drawings() {
        let fx = Fixture::new();
        let stored = serde_json::json!([
            {"entityId": "line-1-00000001", "ownerId": "gm", "ownerName": "GM", "kind": "line",
             "origin": {"x": 0.0, "y": 0.0}, "points": [{"x": 0.0, "y": 0.0}, {"x": 1000.0, "y": 0.0}],
             "strokeWidth": 1e-7, "strokeColor": "#000000", "lineStyle": "dotted",
             "opacity": 1.0, "createdAt": 1, "expiresAt": null, "permanent": true},
            {"entityId": "line-1-00000002", "ownerId": "gm", "ownerName": "GM", "kind": "line",
             "origin": {"x": 0.0, "y": 0.0}, "points": [{"x": -1e300, "y": 0.0}, {"x": 1e300, "y": 0.0}],
             "strokeWidth": 2.0, "strokeColor": "#000000", "lineStyle": "dashed",
             "opacity": 1.0, "createdAt": 1, "expiresAt": null, "permanent": true}
        ]);
        block_on(fx.store.set("scene-1", DEFAULT_STORE_KEY, stored)).unwrap();

        let fresh = fx.join(User::participant("p1", "P1"));
        let [entity] = fresh.entities().permanent() else {
            panic!("expected only the bounded drawing");
        };
        assert_eq!(entity.id, "line-1-00000001");
        assert_eq!(entity.stroke.width, crate::tools::MIN_BRUSH_WIDTH);
    }

    #[test]
    fn test_store_failure_degrades_quietly() {
        let fx = Fixture::new();
        fx.store.set_fail_writes(true);
        let mut gm = fx.join(User::moderator("gm", "GM"));
        gm.tools_mut().set_permanent_mode(true);
        draw_box(&mut gm, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        block_on(gm.flush_store());
        assert_eq!(gm.entities().permanent().len(), 1);

        let fresh = fx.join(User::participant("p1", "P1"));
        assert!(fresh.entities().is_empty());
    }

    #[test]
    fn test_unauthorized_actions_warn() {
        let fx = Fixture::new();
        let mut p1 = fx.join(User::participant("p1", "P1"));
        let mut p2 = fx.join(User::participant("p2", "P2"));
        draw_box(&mut p2, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        p1.pump();
        assert_eq!(p1.entities().len(), 1);

        assert!(matches!(p1.clear(ClearScope::All), Err(DrawError::Unauthorized(_))));
        let id = p1.entities().ephemeral()[0].id.clone();
        assert!(matches!(p1.delete_by_id(&id), Err(DrawError::Unauthorized(_))));
        assert_eq!(p1.undo(), Err(DrawError::NothingToUndo));
        assert_eq!(p1.entities().len(), 1);

        let notices = p1.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| matches!(n, Notice::Warning(_))));
        assert!(p1.take_notices().is_empty());

        assert_eq!(p1.clear(ClearScope::Mine), Ok(0));
    }

    #[test]
    fn test_undo_and_clear_replicate() {
        let fx = Fixture::new();
        let mut gm = fx.join(User::moderator("gm", "GM"));
        let mut p1 = fx.join(User::participant("p1", "P1"));

        draw_box(&mut p1, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        draw_box(&mut p1, Point::new(20.0, 0.0), Point::new(30.0, 10.0));
        gm.pump();
        assert_eq!(gm.entities().len(), 2);

        p1.undo().unwrap();
        gm.pump();
        assert_eq!(gm.entities().len(), 1);

        gm.clear(ClearScope::All).unwrap();
        p1.pump();
        assert!(p1.entities().is_empty());
    }

    #[test]
    fn test_duplicate_delivery_absorbed() {
        let fx = Fixture::new();
        fx.hub.set_duplicate_delivery(true);
        let mut alice = fx.join(User::participant("alice", "Alice"));
        let mut bob = fx.join(User::participant("bob", "Bob"));

        draw_box(&mut alice, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert_eq!(bob.pump(), 1);
        assert_eq!(bob.entities().len(), 1);

        alice.undo().unwrap();
        assert_eq!(bob.pump(), 1);
        assert!(bob.entities().is_empty());
    }

    #[test]
    fn test_replay_ignores_malformed_stored_entries() {
        let fx = Fixture::new();
        let good = VectorEntity {
            id: "box-1-00000000".to_string(),
            owner: Owner {
                id: "gm".to_string(),
                name: "GM".to_string(),
            },
            geometry: Geometry::Box {
                origin: Point::new(1.0, 1.0),
                width: 5.0,
                height: 5.0,
            },
            stroke: StrokeSpec::default(),
            opacity: 1.0,
            created_at: 1,
            expires_at: None,
            permanent: true,
        };
        let value = serde_json::json!([serde_json::to_value(&good).unwrap(), {"kind": "blob"}]);
        block_on(fx.store.set("scene-1", "permanent-drawings", value)).unwrap();

        let session = fx.join(User::participant("p1", "P1"));
        assert_eq!(session.entities().permanent(), &[good]);
    }

    #[test]
    fn test_expiration_and_fade() {
        let fx = Fixture::new();
        let mut alice = fx.join(User::participant("alice", "Alice"));
        draw_box(&mut alice, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert_eq!(alice.entities().len(), 1);

        fx.clock.advance(Duration::from_millis(SessionConfig::default().expiry_timeout_ms));
        assert_eq!(alice.tick(), 1);
        assert!(alice.entities().is_empty());
        assert!(!alice.display_list().is_empty());

        fx.clock.advance(Duration::from_millis(SessionConfig::default().fade_duration_ms));
        alice.tick();
        assert!(alice.display_list().is_empty());
    }

    #[test]
    fn test_inspector_delete_goes_out_on_pump() {
        let fx = Fixture::new();
        let mut gm = fx.join(User::moderator("gm", "GM"));
        let mut p1 = fx.join(User::participant("p1", "P1"));
        draw_box(&mut p1, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        gm.pump();

        let id = gm.inspector().entries()[0].id.clone();
        assert_eq!(gm.inspector().delete(&id), Ok(true));
        gm.pump();
        assert_eq!(p1.pump(), 1);
        assert!(p1.entities().is_empty());
    }

    #[test]
    fn test_remote_delete_of_absent_id_is_noop() {
        let fx = Fixture::new();
        let mut p1 = fx.join(User::participant("p1", "P1"));
        let mut raw = fx.hub.channel();
        let msg = DrawMessage::Deleted(Deletion::entity("p2", "box-9-deadbeef", false));
        crate::sync::BroadcastChannel::send(&mut raw, &msg.encode().unwrap()).unwrap();
        assert_eq!(p1.pump(), 0);
    }

    #[test]
    fn test_preview_in_display_list() {
        let fx = Fixture::new();
        let mut alice = fx.join(User::participant("alice", "Alice"));
        alice.tools_mut().set_mode(ToolMode::Line);
        alice.activate();
        alice.arm();
        alice.pointer_move(Point::new(0.0, 0.0));
        alice.pointer_move(Point::new(30.0, 0.0));
        assert!(!alice.display_list().is_empty());
        assert!(alice.entities().is_empty());

        alice.cancel();
        assert!(alice.display_list().is_empty());
    }

    #[test]
    fn test_detach() {
        let fx = Fixture::new();
        let mut gm = fx.join(User::moderator("gm", "GM"));
        gm.tools_mut().set_permanent_mode(true);
        draw_box(&mut gm, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        block_on(gm.flush_store());

        gm.detach();
        assert!(!gm.is_attached());
        assert!(gm.entities().is_empty());
        assert_eq!(gm.pump(), 0);

        let fresh = fx.join(User::participant("p1", "P1"));
        assert_eq!(fresh.entities().permanent().len(), 1);
    }
}
