//! [`InteractiveClient`]: the public face of the SDK.
//!
//! The client wires the application layer (correlator, dispatcher, throttle
//! manager, resource cache) to one websocket connection at a time and exposes
//! every protocol operation as a typed async method.
//!
//! # Lifecycle
//!
//! ```text
//! connect() ──▶ Connected ──ready()──▶ Ready ──disconnect()──▶ Disconnected
//! ```
//!
//! Read calls (`get_*`, `get_time`, throttle queries) need `Connected` or
//! `Ready`.  Calls that change scenes, groups, controls or participants need
//! `Ready`.  Anything else fails fast with [`ClientError::InvalidState`].
//!
//! # Teardown
//!
//! `disconnect()` flushes queued frames, closes the socket, fails every
//! pending call with [`ClientError::Disconnected`] and clears the cache.  A
//! transport failure noticed by the reader or writer does the same.  Nothing
//! reconnects on its own; call `connect()` again.
//!
//! # Example
//!
//! ```no_run
//! use interactive_client::{ClientConfig, InteractiveClient};
//! use interactive_core::{Control, Scene};
//!
//! # async fn run() -> Result<(), interactive_client::ClientError> {
//! let client = InteractiveClient::from_config(ClientConfig::new(
//!     "wss://interactive.example.net/gameClient",
//!     "token",
//!     1234,
//! ));
//! client.connect().await?;
//! client.ready().await?;
//! client
//!     .create_scenes(vec![Scene::new("lobby").with_control(Control::button("go", "Go!"))])
//!     .await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use interactive_core::domain::throttle::settings_to_wire;
use interactive_core::domain::validation::{
    validate_batch_ids, validate_kind_unchanged, validate_reassignment,
};
use interactive_core::domain::ResourceKind;
use interactive_core::protocol::methods::{
    self, ActiveParticipantsParams, CaptureParams, ControlsParams, DeleteControlsParams,
    DeleteGroupParams, DeleteSceneParams, GroupsParams, PagedParticipantsParams,
    ParticipantsPage, ParticipantsParams, ReadyParams, ScenesParams, TimeResult,
};
use interactive_core::{
    encode_method, Control, Group, Participant, ProtocolError, Scene, ThrottleSetting,
    ThrottleState, ValidationError, DEFAULT_GROUP_ID, DEFAULT_SCENE_ID,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::bootstrap::SessionBootstrap;
use crate::application::cache::ResourceCache;
use crate::application::correlator::{await_outcome, Correlator};
use crate::application::dispatcher::{Dispatcher, EventObserver, EventStream};
use crate::application::inbound::{route_frame, InboundHandler};
use crate::application::lock;
use crate::application::throttle::ThrottleManager;
use crate::domain::{ClientConfig, ClientError, ConnectionState};
use crate::infrastructure::bootstrap::StaticBootstrap;
use crate::infrastructure::transport::{self, Outbound};

/// How long `disconnect` waits for queued frames and the close frame to leave.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
enum Requires {
    /// `Connected` or `Ready`.
    Open,
    Ready,
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// One live connection.
struct Link {
    epoch: u64,
    outbound: mpsc::Sender<Outbound>,
    correlator: Arc<Correlator>,
    writer: JoinHandle<()>,
    reader: Option<JoinHandle<()>>,
}

/// The handles a single call needs, cloned out of the [`Link`].
struct CallPath {
    outbound: mpsc::Sender<Outbound>,
    correlator: Arc<Correlator>,
}

struct Shared {
    config: ClientConfig,
    bootstrap: Arc<dyn SessionBootstrap>,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Link>>,
    epochs: AtomicU64,
    /// Bumped by every `connect` and by a `disconnect` that cancels one.
    attempts: AtomicU64,
    cache: ResourceCache,
    dispatcher: Dispatcher,
    throttle: ThrottleManager,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn attempt_is_current(&self, attempt: u64) -> bool {
        self.attempts.load(Ordering::SeqCst) == attempt
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "connection state changed");
        }
    }

    /// Takes the link out if it still belongs to `epoch`.
    fn detach(&self, epoch: u64) -> Option<Link> {
        let mut guard = lock(&self.link);
        if guard.as_ref().is_some_and(|link| link.epoch == epoch) {
            guard.take()
        } else {
            None
        }
    }

    /// The common tail of every teardown.
    fn finish_teardown(&self, correlator: &Correlator) {
        correlator.close_all();
        self.cache.clear();
        self.throttle.reset_counters();
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Receives frames and transport loss for one connection.
struct SessionHandler {
    shared: Arc<Shared>,
    correlator: Arc<Correlator>,
    epoch: u64,
}

impl InboundHandler for SessionHandler {
    fn on_text(&self, text: &str) {
        route_frame(
            text,
            &self.correlator,
            &self.shared.cache,
            &self.shared.dispatcher,
        );
    }

    fn on_closed(&self, reason: &str) {
        // A stale handler (older epoch) or a teardown already under way finds
        // nothing to detach.
        if let Some(link) = self.shared.detach(self.epoch) {
            warn!(reason, "connection lost");
            link.writer.abort();
            if let Some(reader) = link.reader {
                reader.abort();
            }
            self.shared.finish_teardown(&link.correlator);
        }
    }
}

/// Puts the state back to `Disconnected` if `connect` does not finish and no
/// later attempt or cancellation has taken over.
struct ConnectAttempt<'a> {
    shared: &'a Shared,
    attempt: u64,
    settled: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let _guard = lock(&self.shared.link);
        if self.shared.attempt_is_current(self.attempt) {
            self.shared.set_state(ConnectionState::Disconnected);
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// A client for one interactive session.
///
/// Methods take `&self`; wrap the client in an `Arc` to share it between
/// tasks.  Dropping the client stops its background tasks.
pub struct InteractiveClient {
    shared: Arc<Shared>,
}

impl InteractiveClient {
    pub fn new(config: ClientConfig, bootstrap: Arc<dyn SessionBootstrap>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                bootstrap,
                state,
                link: Mutex::new(None),
                epochs: AtomicU64::new(0),
                attempts: AtomicU64::new(0),
                cache: ResourceCache::new(),
                dispatcher: Dispatcher::new(),
                throttle: ThrottleManager::new(),
            }),
        }
    }

    /// A client whose connection target comes straight from `config`.
    pub fn from_config(config: ClientConfig) -> Self {
        let bootstrap = Arc::new(StaticBootstrap::from_config(&config));
        Self::new(config, bootstrap)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of calls waiting for a reply on the current connection.
    pub fn pending_calls(&self) -> usize {
        lock(&self.shared.link)
            .as_ref()
            .map_or(0, |link| link.correlator.pending_count())
    }

    // ── Connection lifecycle ──────────────────────────────────────────────────

    /// Opens a session.
    ///
    /// The bootstrap is asked for a fresh target on every call.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidState`] unless currently `Disconnected`.
    /// - [`ClientError::Bootstrap`] if no target could be obtained.
    /// - [`ClientError::Transport`] if the handshake fails.
    /// - [`ClientError::Disconnected`] if `disconnect` cancelled the attempt.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let attempt = {
            let guard = lock(&self.shared.link);
            let state = self.shared.state();
            if guard.is_some() || state != ConnectionState::Disconnected {
                return Err(ClientError::InvalidState {
                    operation: "connect",
                    state,
                });
            }
            self.shared.set_state(ConnectionState::Connecting);
            self.shared.attempts.fetch_add(1, Ordering::SeqCst) + 1
        };
        let mut pending = ConnectAttempt {
            shared: &self.shared,
            attempt,
            settled: false,
        };
        self.open_link(attempt).await?;
        pending.settled = true;
        Ok(())
    }

    async fn open_link(&self, attempt: u64) -> Result<(), ClientError> {
        let target = self
            .shared
            .bootstrap
            .target()
            .await
            .map_err(ClientError::Bootstrap)?;
        if !self.shared.attempt_is_current(attempt) {
            debug!("connect cancelled before the handshake");
            return Err(ClientError::Disconnected);
        }
        info!(endpoint = %target.endpoint, version_id = target.version_id, "connecting");
        let stream = transport::open(&target, &self.shared.config.protocol_version).await?;
        let (sink, source) = stream.split();

        let epoch = self.shared.epochs.fetch_add(1, Ordering::Relaxed);
        let correlator = Arc::new(Correlator::new());
        let handler = Arc::new(SessionHandler {
            shared: Arc::clone(&self.shared),
            correlator: Arc::clone(&correlator),
            epoch,
        });
        let (outbound, queue) = mpsc::channel(self.shared.config.outbound_queue.max(1));
        let installed = {
            let mut guard = lock(&self.shared.link);
            if self.shared.attempt_is_current(attempt) {
                let writer = transport::spawn_writer(sink, queue, Arc::clone(&handler));
                *guard = Some(Link {
                    epoch,
                    outbound,
                    correlator,
                    writer,
                    reader: None,
                });
                self.shared.set_state(ConnectionState::Connected);
                Ok(())
            } else {
                Err(sink)
            }
        };
        if let Err(mut sink) = installed {
            debug!("connect cancelled after the handshake; closing the socket");
            let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
            return Err(ClientError::Disconnected);
        }

        let reader = transport::spawn_reader(source, handler);
        if let Some(link) = lock(&self.shared.link)
            .as_mut()
            .filter(|link| link.epoch == epoch)
        {
            link.reader = Some(reader);
        }
        Ok(())
    }

    /// Declares the session ready for viewer input.  Same as `set_ready(true)`.
    pub async fn ready(&self) -> Result<(), ClientError> {
        self.set_ready(true).await
    }

    /// Sends `ready` and moves to `Ready` (or back to `Connected` for `false`).
    pub async fn set_ready(&self, is_ready: bool) -> Result<(), ClientError> {
        self.invoke(
            "ready",
            Requires::Open,
            methods::READY,
            &ReadyParams { is_ready },
        )
        .await?;
        let next = if is_ready {
            ConnectionState::Ready
        } else {
            ConnectionState::Connected
        };
        let changed = self.shared.state.send_if_modified(|state| {
            if state.is_open() && *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            info!(to = %next, "connection state changed");
        }
        Ok(())
    }

    /// Closes the session.
    ///
    /// A `connect` still in flight is cancelled and returns
    /// [`ClientError::Disconnected`].  Calling it when not connected does
    /// nothing.
    pub async fn disconnect(&self) {
        let link = {
            let mut guard = lock(&self.shared.link);
            let link = guard.take();
            if link.is_some() {
                self.shared.set_state(ConnectionState::Disconnecting);
            } else if self.shared.state() == ConnectionState::Connecting {
                self.shared.attempts.fetch_add(1, Ordering::SeqCst);
                self.shared.set_state(ConnectionState::Disconnected);
                info!("connect attempt cancelled");
                return;
            }
            link
        };
        let Some(Link {
            outbound,
            correlator,
            mut writer,
            reader,
            ..
        }) = link
        else {
            debug!("disconnect: not connected");
            return;
        };

        // The close marker queues behind every frame already accepted.
        let flushed = tokio::time::timeout(CLOSE_GRACE, async {
            let _ = outbound.send(Outbound::Close).await;
            drop(outbound);
            let _ = (&mut writer).await;
        })
        .await;
        if flushed.is_err() {
            warn!(grace = ?CLOSE_GRACE, "writer did not finish in time; aborting it");
            writer.abort();
        }
        if let Some(reader) = reader {
            reader.abort();
            let _ = reader.await;
        }
        self.shared.finish_teardown(&correlator);
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Pull-based subscription to pushes of `method`, or `"*"` for all.
    pub fn subscribe(&self, method: &str) -> EventStream {
        self.shared.dispatcher.subscribe(method)
    }

    /// Push-based subscription; spawns the observer's worker task.
    pub fn observe(&self, method: &str, observer: Arc<dyn EventObserver>) -> JoinHandle<()> {
        self.shared.dispatcher.observe(method, observer)
    }

    // ── Raw calls ─────────────────────────────────────────────────────────────

    /// Sends an arbitrary method and returns its raw result.
    ///
    /// Nothing is mirrored into the cache.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let path = self.call_path("call", Requires::Open)?;
        self.send(path, method, params).await
    }

    pub async fn get_time(&self) -> Result<u64, ClientError> {
        let value = self
            .invoke("get_time", Requires::Open, methods::GET_TIME, &empty())
            .await?;
        Ok(parse_result::<TimeResult>(methods::GET_TIME, value)?.time)
    }

    /// Collects the sparks charged by a `giveInput` transaction.
    pub async fn capture(&self, transaction_id: &str) -> Result<(), ClientError> {
        let path = self.call_path("capture", Requires::Ready)?;
        let params = CaptureParams {
            transaction_id: transaction_id.to_string(),
        };
        self.send(path, methods::CAPTURE, to_params(&params)?).await?;
        Ok(())
    }

    // ── Scenes ────────────────────────────────────────────────────────────────

    /// Fetches every scene and replaces the cached collection.
    pub async fn get_scenes(&self) -> Result<Vec<Scene>, ClientError> {
        let value = self
            .invoke("get_scenes", Requires::Open, methods::GET_SCENES, &empty())
            .await?;
        let scenes = parse_result::<ScenesParams>(methods::GET_SCENES, value)?.scenes;
        self.shared.cache.replace_scenes(scenes.clone());
        Ok(scenes)
    }

    /// Fetches scenes and returns the one named `scene_id`, if it exists.
    pub async fn get_scene(&self, scene_id: &str) -> Result<Option<Scene>, ClientError> {
        Ok(self
            .get_scenes()
            .await?
            .into_iter()
            .find(|scene| scene.scene_id == scene_id))
    }

    pub async fn create_scenes(&self, scenes: Vec<Scene>) -> Result<Vec<Scene>, ClientError> {
        self.write_scenes("create_scenes", methods::CREATE_SCENES, scenes)
            .await
    }

    pub async fn update_scenes(&self, scenes: Vec<Scene>) -> Result<Vec<Scene>, ClientError> {
        self.write_scenes("update_scenes", methods::UPDATE_SCENES, scenes)
            .await
    }

    async fn write_scenes(
        &self,
        operation: &'static str,
        method: &str,
        scenes: Vec<Scene>,
    ) -> Result<Vec<Scene>, ClientError> {
        let path = self.call_path(operation, Requires::Ready)?;
        validate_batch_ids(
            ResourceKind::Scene,
            scenes.iter().map(|s| s.scene_id.as_str()),
        )?;
        let value = self
            .send(path, method, to_params(&ScenesParams { scenes })?)
            .await?;
        let scenes = parse_result::<ScenesParams>(method, value)?.scenes;
        self.shared.cache.upsert_scenes(scenes.clone());
        Ok(scenes)
    }

    /// Deletes a scene, moving groups that showed it to `reassign_to`.
    ///
    /// `reassign_to` must be `"default"` or a scene the server knows; a target
    /// missing from the cache triggers a `get_scenes` first.  After the server
    /// confirms, groups are re-read so the cache mirrors the server's
    /// migration.  If that re-read fails the groups that showed the scene are
    /// dropped from the cache rather than guessed at.
    pub async fn delete_scene(&self, scene_id: &str, reassign_to: &str) -> Result<(), ClientError> {
        let path = self.call_path("delete_scene", Requires::Ready)?;
        validate_reassignment(
            ResourceKind::Scene,
            scene_id,
            reassign_to,
            DEFAULT_SCENE_ID,
            |_| true,
        )?;
        if reassign_to != DEFAULT_SCENE_ID && !self.shared.cache.has_scene(reassign_to) {
            debug!(reassign_to, "reassignment target not cached; reading scenes");
            self.get_scenes().await?;
        }
        validate_reassignment(
            ResourceKind::Scene,
            scene_id,
            reassign_to,
            DEFAULT_SCENE_ID,
            |id| self.shared.cache.has_scene(id),
        )?;
        let params = DeleteSceneParams {
            scene_id: scene_id.to_string(),
            reassign_scene_id: reassign_to.to_string(),
        };
        self.send(path, methods::DELETE_SCENE, to_params(&params)?)
            .await?;
        self.shared.cache.remove_scene(scene_id);
        if let Err(e) = self.get_groups().await {
            warn!(scene_id, "scene deleted but groups could not be re-read: {e}");
        }
        Ok(())
    }

    // ── Groups ────────────────────────────────────────────────────────────────

    /// Fetches every group and replaces the cached collection.
    pub async fn get_groups(&self) -> Result<Vec<Group>, ClientError> {
        let value = self
            .invoke("get_groups", Requires::Open, methods::GET_GROUPS, &empty())
            .await?;
        let groups = parse_result::<GroupsParams>(methods::GET_GROUPS, value)?.groups;
        self.shared.cache.replace_groups(groups.clone());
        Ok(groups)
    }

    pub async fn create_groups(&self, groups: Vec<Group>) -> Result<Vec<Group>, ClientError> {
        self.write_groups("create_groups", methods::CREATE_GROUPS, groups)
            .await
    }

    pub async fn update_groups(&self, groups: Vec<Group>) -> Result<Vec<Group>, ClientError> {
        self.write_groups("update_groups", methods::UPDATE_GROUPS, groups)
            .await
    }

    async fn write_groups(
        &self,
        operation: &'static str,
        method: &str,
        groups: Vec<Group>,
    ) -> Result<Vec<Group>, ClientError> {
        let path = self.call_path(operation, Requires::Ready)?;
        validate_batch_ids(
            ResourceKind::Group,
            groups.iter().map(|g| g.group_id.as_str()),
        )?;
        let value = self
            .send(path, method, to_params(&GroupsParams { groups })?)
            .await?;
        let groups = parse_result::<GroupsParams>(method, value)?.groups;
        self.shared.cache.upsert_groups(groups.clone());
        Ok(groups)
    }

    /// Deletes a group, moving its participants to `reassign_to`.
    ///
    /// A target missing from the cache triggers a `get_groups` first.  The
    /// group's cached participants are dropped; their new group arrives with
    /// the server's next participant update.
    pub async fn delete_group(&self, group_id: &str, reassign_to: &str) -> Result<(), ClientError> {
        let path = self.call_path("delete_group", Requires::Ready)?;
        validate_reassignment(
            ResourceKind::Group,
            group_id,
            reassign_to,
            DEFAULT_GROUP_ID,
            |_| true,
        )?;
        if reassign_to != DEFAULT_GROUP_ID && !self.shared.cache.has_group(reassign_to) {
            debug!(reassign_to, "reassignment target not cached; reading groups");
            self.get_groups().await?;
        }
        validate_reassignment(
            ResourceKind::Group,
            group_id,
            reassign_to,
            DEFAULT_GROUP_ID,
            |id| self.shared.cache.has_group(id),
        )?;
        let params = DeleteGroupParams {
            group_id: group_id.to_string(),
            reassign_group_id: reassign_to.to_string(),
        };
        self.send(path, methods::DELETE_GROUP, to_params(&params)?)
            .await?;
        self.shared.cache.remove_group(group_id);
        Ok(())
    }

    // ── Controls ──────────────────────────────────────────────────────────────

    pub async fn create_controls(
        &self,
        scene_id: &str,
        controls: Vec<Control>,
    ) -> Result<Vec<Control>, ClientError> {
        let path = self.call_path("create_controls", Requires::Ready)?;
        validate_controls(scene_id, &controls)?;
        self.write_controls(path, methods::CREATE_CONTROLS, scene_id, controls)
            .await
    }

    /// Updates controls.  A control's kind cannot change.
    pub async fn update_controls(
        &self,
        scene_id: &str,
        controls: Vec<Control>,
    ) -> Result<Vec<Control>, ClientError> {
        let path = self.call_path("update_controls", Requires::Ready)?;
        validate_controls(scene_id, &controls)?;
        for control in &controls {
            if let Some(cached) = self.shared.cache.control(scene_id, &control.control_id) {
                validate_kind_unchanged(&cached, control)?;
            }
        }
        self.write_controls(path, methods::UPDATE_CONTROLS, scene_id, controls)
            .await
    }

    async fn write_controls(
        &self,
        path: CallPath,
        method: &str,
        scene_id: &str,
        controls: Vec<Control>,
    ) -> Result<Vec<Control>, ClientError> {
        let params = ControlsParams {
            scene_id: scene_id.to_string(),
            controls,
        };
        let value = self.send(path, method, to_params(&params)?).await?;
        let reply = parse_result::<ControlsParams>(method, value)?;
        self.shared
            .cache
            .upsert_controls(&reply.scene_id, reply.controls.clone());
        Ok(reply.controls)
    }

    pub async fn delete_controls(
        &self,
        scene_id: &str,
        control_ids: Vec<String>,
    ) -> Result<(), ClientError> {
        let path = self.call_path("delete_controls", Requires::Ready)?;
        if scene_id.is_empty() {
            return Err(ValidationError::EmptyId {
                resource: ResourceKind::Scene,
            }
            .into());
        }
        validate_batch_ids(
            ResourceKind::Control,
            control_ids.iter().map(String::as_str),
        )?;
        let params = DeleteControlsParams {
            scene_id: scene_id.to_string(),
            control_ids,
        };
        self.send(path, methods::DELETE_CONTROLS, to_params(&params)?)
            .await?;
        self.shared
            .cache
            .remove_controls(scene_id, params.control_ids.iter().map(String::as_str));
        Ok(())
    }

    // ── Participants ──────────────────────────────────────────────────────────

    /// Fetches every connected participant, page by page.
    pub async fn get_all_participants(&self) -> Result<Vec<Participant>, ClientError> {
        self.get_all_participants_from(0).await
    }

    /// Fetches participants connected after `from` (Unix ms), page by page.
    ///
    /// # Errors
    ///
    /// [`ClientError::RateLimited`] if the server throttles a page; it carries
    /// the participants gathered so far and the cursor to resume from.
    pub async fn get_all_participants_from(
        &self,
        from: u64,
    ) -> Result<Vec<Participant>, ClientError> {
        let limit = self.shared.config.participant_page_limit.max(1);
        let mut gathered: Vec<Participant> = Vec::new();
        let mut cursor = from;
        let mut complete = false;

        for _ in 0..limit {
            let reply = self
                .invoke(
                    "get_all_participants",
                    Requires::Open,
                    methods::GET_ALL_PARTICIPANTS,
                    &PagedParticipantsParams { from: cursor },
                )
                .await;
            let value = match reply {
                Err(ClientError::Application(error)) if error.is_rate_limited() => {
                    warn!(
                        gathered = gathered.len(),
                        resume_from = cursor,
                        "participant paging rate limited"
                    );
                    return Err(ClientError::RateLimited {
                        error,
                        partial: gathered,
                        resume_from: cursor,
                    });
                }
                other => other?,
            };
            let page: ParticipantsPage = parse_result(methods::GET_ALL_PARTICIPANTS, value)?;
            let next = page.next_cursor();
            let has_more = page.has_more;
            self.shared
                .cache
                .upsert_participants(page.participants.clone());
            gathered.extend(page.participants);

            match next {
                _ if !has_more => {
                    complete = true;
                    break;
                }
                Some(next) if next > cursor => cursor = next,
                _ => {
                    warn!(cursor, "participant cursor did not advance; stopping");
                    break;
                }
            }
        }

        if !complete {
            warn!(limit, gathered = gathered.len(), "participant paging stopped early");
        } else if from == 0 {
            self.shared.cache.replace_participants(gathered.clone());
        }
        Ok(gathered)
    }

    /// Participants whose last input is newer than `threshold` (Unix ms).
    pub async fn get_active_participants(
        &self,
        threshold: u64,
    ) -> Result<Vec<Participant>, ClientError> {
        let value = self
            .invoke(
                "get_active_participants",
                Requires::Open,
                methods::GET_ACTIVE_PARTICIPANTS,
                &ActiveParticipantsParams { threshold },
            )
            .await?;
        let page: ParticipantsPage = parse_result(methods::GET_ACTIVE_PARTICIPANTS, value)?;
        self.shared
            .cache
            .upsert_participants(page.participants.clone());
        Ok(page.participants)
    }

    pub async fn update_participants(
        &self,
        participants: Vec<Participant>,
    ) -> Result<Vec<Participant>, ClientError> {
        let path = self.call_path("update_participants", Requires::Ready)?;
        let ids: Vec<String> = participants
            .iter()
            .map(|p| p.session_id.to_string())
            .collect();
        validate_batch_ids(ResourceKind::Participant, ids.iter().map(String::as_str))?;
        let value = self
            .send(
                path,
                methods::UPDATE_PARTICIPANTS,
                to_params(&ParticipantsParams { participants })?,
            )
            .await?;
        let participants =
            parse_result::<ParticipantsParams>(methods::UPDATE_PARTICIPANTS, value)?.participants;
        self.shared
            .cache
            .upsert_participants(participants.clone());
        Ok(participants)
    }

    // ── Throttling ────────────────────────────────────────────────────────────

    /// Asks the server to throttle the given methods.
    pub async fn set_bandwidth_throttle(
        &self,
        settings: Vec<ThrottleSetting>,
    ) -> Result<(), ClientError> {
        let path = self.call_path("set_bandwidth_throttle", Requires::Open)?;
        ThrottleManager::validate(&settings)?;
        self.send(
            path,
            methods::SET_BANDWIDTH_THROTTLE,
            to_params(&settings_to_wire(&settings))?,
        )
        .await?;
        self.shared.throttle.apply(&settings);
        Ok(())
    }

    /// Reads the server's throttle state and adopts it as the local view.
    pub async fn get_throttle_state(
        &self,
    ) -> Result<BTreeMap<String, ThrottleState>, ClientError> {
        let value = self
            .invoke(
                "get_throttle_state",
                Requires::Open,
                methods::GET_THROTTLE_STATE,
                &empty(),
            )
            .await?;
        let states: BTreeMap<String, ThrottleState> =
            parse_result(methods::GET_THROTTLE_STATE, value)?;
        self.shared.throttle.replace_with(&states);
        Ok(states)
    }

    /// The locally known throttle settings.
    pub fn throttle_settings(&self) -> Vec<ThrottleSetting> {
        self.shared.throttle.settings()
    }

    // ── Cache snapshots ───────────────────────────────────────────────────────

    pub fn cached_scene(&self, scene_id: &str) -> Option<Scene> {
        self.shared.cache.scene(scene_id)
    }

    pub fn cached_scenes(&self) -> Vec<Scene> {
        self.shared.cache.scenes()
    }

    pub fn cached_control(&self, scene_id: &str, control_id: &str) -> Option<Control> {
        self.shared.cache.control(scene_id, control_id)
    }

    pub fn cached_group(&self, group_id: &str) -> Option<Group> {
        self.shared.cache.group(group_id)
    }

    pub fn cached_groups(&self) -> Vec<Group> {
        self.shared.cache.groups()
    }

    pub fn cached_participant(&self, session_id: Uuid) -> Option<Participant> {
        self.shared.cache.participant(session_id)
    }

    pub fn cached_participants(&self) -> Vec<Participant> {
        self.shared.cache.participants()
    }

    // ── Call plumbing ─────────────────────────────────────────────────────────

    fn call_path(
        &self,
        operation: &'static str,
        requires: Requires,
    ) -> Result<CallPath, ClientError> {
        let guard = lock(&self.shared.link);
        let state = self.shared.state();
        let allowed = match requires {
            Requires::Open => state.is_open(),
            Requires::Ready => state == ConnectionState::Ready,
        };
        match guard.as_ref() {
            Some(link) if allowed => Ok(CallPath {
                outbound: link.outbound.clone(),
                correlator: Arc::clone(&link.correlator),
            }),
            _ => Err(ClientError::InvalidState { operation, state }),
        }
    }

    async fn invoke<P: Serialize>(
        &self,
        operation: &'static str,
        requires: Requires,
        method: &str,
        params: &P,
    ) -> Result<Value, ClientError> {
        let path = self.call_path(operation, requires)?;
        self.send(path, method, to_params(params)?).await
    }

    /// Registers, queues and awaits one call.
    async fn send(&self, path: CallPath, method: &str, params: Value) -> Result<Value, ClientError> {
        let CallPath {
            outbound,
            correlator,
        } = path;
        self.shared.throttle.record(method);
        let (id, slot) = correlator.register(method)?;
        let frame = match encode_method(id, method, params) {
            Ok(frame) => frame,
            Err(e) => {
                correlator.cancel(id);
                return Err(e.into());
            }
        };
        debug!(id, method, "call queued");
        if outbound.send(Outbound::Frame(frame)).await.is_err() {
            correlator.cancel(id);
            return Err(ClientError::Disconnected);
        }
        await_outcome(
            &correlator,
            id,
            method,
            slot,
            self.shared.config.call_timeout(),
        )
        .await
    }
}

impl Drop for InteractiveClient {
    fn drop(&mut self) {
        let link = lock(&self.shared.link).take();
        if let Some(link) = link {
            link.writer.abort();
            if let Some(reader) = link.reader {
                reader.abort();
            }
            link.correlator.close_all();
        }
    }
}

fn validate_controls(scene_id: &str, controls: &[Control]) -> Result<(), ValidationError> {
    if scene_id.is_empty() {
        return Err(ValidationError::EmptyId {
            resource: ResourceKind::Scene,
        });
    }
    validate_batch_ids(
        ResourceKind::Control,
        controls.iter().map(|c| c.control_id.as_str()),
    )
}

fn empty() -> Value {
    Value::Object(serde_json::Map::new())
}

fn to_params<P: Serialize>(params: &P) -> Result<Value, ClientError> {
    serde_json::to_value(params).map_err(|e| ProtocolError::Encode(e.to_string()).into())
}

fn parse_result<R: DeserializeOwned>(method: &str, value: Value) -> Result<R, ClientError> {
    serde_json::from_value(value).map_err(|source| ClientError::UnexpectedResult {
        method: method.to_string(),
        source,
    })
}
