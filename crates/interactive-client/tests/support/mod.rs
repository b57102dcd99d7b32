//! A scripted interactive service for the integration tests.
//!
//! The server listens on an ephemeral loopback port, serves one websocket at
//! a time, and keeps a small in-memory world (scenes, groups, participants,
//! throttles) that the methods read and mutate.  Tests steer it through
//! [`MockServer`]: push events, inject raw frames, or cut the connection.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use interactive_client::ClientConfig;
use interactive_core::domain::ThrottleLimit;
use interactive_core::protocol::codec::{encode_push, encode_reply};
use interactive_core::protocol::error_codes;
use interactive_core::protocol::events;
use interactive_core::protocol::methods::{
    self, ActiveParticipantsParams, CaptureParams, ControlsParams, DeleteControlsParams,
    DeleteGroupParams, DeleteSceneParams, GroupsParams, PagedParticipantsParams,
    ParticipantsParams, ReadyParams, ScenesParams,
};
use interactive_core::protocol::{MethodPacket, ReplyPacket};
use interactive_core::{
    decode_packet, Group, Packet, Participant, ReplyError, Scene, ThrottleState,
    DEFAULT_GROUP_ID, DEFAULT_SCENE_ID,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub const TOKEN: &str = "test-token";
pub const VERSION_ID: u64 = 42;

/// Knobs for misbehaving on purpose.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Participants per `getAllParticipants` page.
    pub page_size: usize,
    /// Answer this `getAllParticipants` page (0-based, counted across the
    /// server's lifetime) with a 4429 error.
    pub rate_limit_on_page: Option<usize>,
    /// Methods that are recorded but never answered.
    pub silent_methods: Vec<&'static str>,
    /// Send every reply twice.
    pub duplicate_replies: bool,
    /// Methods answered with an internal error.
    pub failing_methods: Vec<&'static str>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            page_size: 2,
            rate_limit_on_page: None,
            silent_methods: Vec::new(),
            duplicate_replies: false,
            failing_methods: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Push(String, Value),
    Raw(String),
    Close,
    Drop,
}

/// The server's resource state.
#[derive(Debug)]
pub struct World {
    pub scenes: BTreeMap<String, Scene>,
    pub groups: BTreeMap<String, Group>,
    pub participants: Vec<Participant>,
    pub throttles: BTreeMap<String, ThrottleState>,
    pub ready: bool,
    pages_served: usize,
}

impl Default for World {
    fn default() -> Self {
        let mut scenes = BTreeMap::new();
        scenes.insert(DEFAULT_SCENE_ID.to_string(), Scene::new(DEFAULT_SCENE_ID));
        let mut groups = BTreeMap::new();
        groups.insert(
            DEFAULT_GROUP_ID.to_string(),
            Group::new(DEFAULT_GROUP_ID, DEFAULT_SCENE_ID),
        );
        Self {
            scenes,
            groups,
            participants: Vec::new(),
            throttles: BTreeMap::new(),
            ready: false,
            pages_served: 0,
        }
    }
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<MethodPacket>>>,
    headers: Arc<Mutex<Option<HeaderMap>>>,
    connections: Arc<Mutex<usize>>,
}

pub struct MockServer {
    pub url: String,
    commands: mpsc::UnboundedSender<Command>,
    recorder: Recorder,
    world: Arc<Mutex<World>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/gameClient", listener.local_addr().unwrap());
        let (commands, mut queue) = mpsc::unbounded_channel();
        let recorder = Recorder::default();
        let world = Arc::new(Mutex::new(World::default()));

        let task = {
            let recorder = recorder.clone();
            let world = Arc::clone(&world);
            tokio::spawn(async move {
                while let Ok((tcp, _)) = listener.accept().await {
                    let headers = Arc::clone(&recorder.headers);
                    let capture = move |request: &Request,
                                        response: Response|
                          -> Result<Response, ErrorResponse> {
                        *headers.lock().unwrap() = Some(request.headers().clone());
                        Ok(response)
                    };
                    let Ok(ws) = accept_hdr_async(tcp, capture).await else {
                        continue;
                    };
                    *recorder.connections.lock().unwrap() += 1;
                    serve(ws, &mut queue, &recorder, &world, &options).await;
                }
            })
        };

        Self {
            url,
            commands,
            recorder,
            world,
            task,
        }
    }

    /// A config pointing at this server with no call deadline.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone(), TOKEN, VERSION_ID)
    }

    pub fn push(&self, method: &str, params: Value) {
        let _ = self.commands.send(Command::Push(method.to_string(), params));
    }

    pub fn send_raw(&self, frame: &str) {
        let _ = self.commands.send(Command::Raw(frame.to_string()));
    }

    /// Sends a close frame and ends the connection.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Drops the socket without a close handshake.
    pub fn drop_connection(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    pub fn seed_participants(&self, participants: Vec<Participant>) {
        self.world.lock().unwrap().participants = participants;
    }

    /// Adds scenes the client has not seen yet.
    pub fn seed_scenes(&self, scenes: Vec<Scene>) {
        let mut world = self.world.lock().unwrap();
        for scene in scenes {
            world.scenes.insert(scene.scene_id.clone(), scene);
        }
    }

    /// Adds groups the client has not seen yet.
    pub fn seed_groups(&self, groups: Vec<Group>) {
        let mut world = self.world.lock().unwrap();
        for group in groups {
            world.groups.insert(group.group_id.clone(), group);
        }
    }

    pub fn world<R>(&self, read: impl FnOnce(&World) -> R) -> R {
        read(&self.world.lock().unwrap())
    }

    /// Method names received so far, in arrival order.
    pub fn methods(&self) -> Vec<String> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.method.clone())
            .collect()
    }

    pub fn calls(&self, method: &str) -> Vec<MethodPacket> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// A handshake header from the most recent connection.
    pub fn header(&self, name: &str) -> Option<String> {
        self.recorder
            .headers
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|headers| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    pub fn connections(&self) -> usize {
        *self.recorder.connections.lock().unwrap()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn participant(username: &str, connected_at: u64) -> Participant {
    let mut participant = Participant::new(uuid::Uuid::new_v4(), username);
    participant.connected_at = connected_at;
    participant.last_input_at = connected_at;
    participant
}

// ── Connection loop ───────────────────────────────────────────────────────────

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    queue: &mut mpsc::UnboundedReceiver<Command>,
    recorder: &Recorder,
    world: &Mutex<World>,
    options: &ServerOptions,
) {
    let hello = encode_push(events::HELLO, json!({})).unwrap();
    if ws.send(Message::Text(hello)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = ws.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) => {
                        let _ = ws.close(None).await;
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return,
                };
                let Ok(Packet::Method(call)) = decode_packet(&text) else {
                    continue;
                };
                recorder.calls.lock().unwrap().push(call.clone());
                let Some(id) = call.id else {
                    continue;
                };
                if options.silent_methods.contains(&call.method.as_str()) {
                    continue;
                }

                let mut pushes = Vec::new();
                let outcome = if options.failing_methods.contains(&call.method.as_str()) {
                    Err(ReplyError::new(5000, "internal error"))
                } else {
                    handle(&mut world.lock().unwrap(), options, &call, &mut pushes)
                };
                let reply = match outcome {
                    Ok(result) => ReplyPacket::success(id, result),
                    Err(error) => ReplyPacket::failure(id, error),
                };
                let frame = encode_reply(&reply).unwrap();
                let copies = if options.duplicate_replies { 2 } else { 1 };
                for _ in 0..copies {
                    if ws.send(Message::Text(frame.clone())).await.is_err() {
                        return;
                    }
                }
                for (method, params) in pushes {
                    let push = encode_push(method, params).unwrap();
                    if ws.send(Message::Text(push)).await.is_err() {
                        return;
                    }
                }
            }
            Some(command) = queue.recv() => match command {
                Command::Push(method, params) => {
                    let push = encode_push(&method, params).unwrap();
                    if ws.send(Message::Text(push)).await.is_err() {
                        return;
                    }
                }
                Command::Raw(frame) => {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                Command::Close => {
                    let _ = ws.close(None).await;
                    return;
                }
                Command::Drop => return,
            },
        }
    }
}

// ── Method handlers ───────────────────────────────────────────────────────────

fn handle(
    world: &mut World,
    options: &ServerOptions,
    call: &MethodPacket,
    pushes: &mut Vec<(&'static str, Value)>,
) -> Result<Value, ReplyError> {
    let params = call.params.clone();
    match call.method.as_str() {
        methods::READY => {
            let ready: ReadyParams = parse(params)?;
            world.ready = ready.is_ready;
            pushes.push((events::ON_READY, json!({ "isReady": ready.is_ready })));
            Ok(json!({}))
        }
        methods::GET_TIME => Ok(json!({ "time": 1_700_000_000_000u64 })),

        methods::GET_SCENES => Ok(json!({ "scenes": world.scenes.values().collect::<Vec<_>>() })),
        methods::CREATE_SCENES => {
            let batch: ScenesParams = parse(params)?;
            for scene in &batch.scenes {
                if world.scenes.contains_key(&scene.scene_id) {
                    return Err(ReplyError::new(error_codes::ALREADY_EXISTS, "scene exists"));
                }
            }
            for scene in &batch.scenes {
                world.scenes.insert(scene.scene_id.clone(), scene.clone());
            }
            Ok(to_value(&batch))
        }
        methods::UPDATE_SCENES => {
            let batch: ScenesParams = parse(params)?;
            for scene in &batch.scenes {
                if !world.scenes.contains_key(&scene.scene_id) {
                    return Err(ReplyError::new(error_codes::UNKNOWN_SCENE, "unknown scene"));
                }
            }
            for scene in &batch.scenes {
                world.scenes.insert(scene.scene_id.clone(), scene.clone());
            }
            Ok(to_value(&batch))
        }
        methods::DELETE_SCENE => {
            let delete: DeleteSceneParams = parse(params)?;
            if delete.scene_id == DEFAULT_SCENE_ID {
                return Err(ReplyError::new(error_codes::RESERVED_RESOURCE, "reserved"));
            }
            if world.scenes.remove(&delete.scene_id).is_none() {
                return Err(ReplyError::new(error_codes::UNKNOWN_SCENE, "unknown scene"));
            }
            for group in world.groups.values_mut() {
                if group.scene_id == delete.scene_id {
                    group.scene_id = delete.reassign_scene_id.clone();
                }
            }
            pushes.push((events::ON_SCENE_DELETE, to_value(&delete)));
            Ok(json!({}))
        }

        methods::GET_GROUPS => Ok(json!({ "groups": world.groups.values().collect::<Vec<_>>() })),
        methods::CREATE_GROUPS | methods::UPDATE_GROUPS => {
            let batch: GroupsParams = parse(params)?;
            let creating = call.method == methods::CREATE_GROUPS;
            for group in &batch.groups {
                if creating == world.groups.contains_key(&group.group_id) {
                    return Err(ReplyError::new(error_codes::INVALID_PARAMS, "bad group id"));
                }
                if !world.scenes.contains_key(&group.scene_id) {
                    return Err(ReplyError::new(error_codes::UNKNOWN_SCENE, "unknown scene"));
                }
            }
            for group in &batch.groups {
                world.groups.insert(group.group_id.clone(), group.clone());
            }
            Ok(to_value(&batch))
        }
        methods::DELETE_GROUP => {
            let delete: DeleteGroupParams = parse(params)?;
            if delete.group_id == DEFAULT_GROUP_ID {
                return Err(ReplyError::new(error_codes::RESERVED_RESOURCE, "reserved"));
            }
            if world.groups.remove(&delete.group_id).is_none() {
                return Err(ReplyError::new(error_codes::UNKNOWN_GROUP, "unknown group"));
            }
            for participant in &mut world.participants {
                if participant.group_id == delete.group_id {
                    participant.group_id = delete.reassign_group_id.clone();
                }
            }
            Ok(json!({}))
        }

        methods::CREATE_CONTROLS | methods::UPDATE_CONTROLS => {
            let batch: ControlsParams = parse(params)?;
            let Some(scene) = world.scenes.get_mut(&batch.scene_id) else {
                return Err(ReplyError::new(error_codes::UNKNOWN_SCENE, "unknown scene"));
            };
            for control in &batch.controls {
                match scene.control_mut(&control.control_id) {
                    Some(existing) => *existing = control.clone(),
                    None if call.method == methods::CREATE_CONTROLS => {
                        scene.controls.push(control.clone())
                    }
                    None => {
                        return Err(ReplyError::new(
                            error_codes::UNKNOWN_CONTROL,
                            "unknown control",
                        ))
                    }
                }
            }
            Ok(to_value(&batch))
        }
        methods::DELETE_CONTROLS => {
            let delete: DeleteControlsParams = parse(params)?;
            let Some(scene) = world.scenes.get_mut(&delete.scene_id) else {
                return Err(ReplyError::new(error_codes::UNKNOWN_SCENE, "unknown scene"));
            };
            scene
                .controls
                .retain(|c| !delete.control_ids.contains(&c.control_id));
            Ok(json!({}))
        }

        methods::GET_ALL_PARTICIPANTS => {
            let paging: PagedParticipantsParams = parse(params)?;
            let page_index = world.pages_served;
            world.pages_served += 1;
            if options.rate_limit_on_page == Some(page_index) {
                return Err(ReplyError::new(error_codes::RATE_LIMITED, "slow down"));
            }
            let mut newer: Vec<&Participant> = world
                .participants
                .iter()
                .filter(|p| p.connected_at > paging.from)
                .collect();
            newer.sort_by_key(|p| p.connected_at);
            let has_more = newer.len() > options.page_size;
            newer.truncate(options.page_size);
            Ok(json!({
                "participants": newer,
                "total": world.participants.len(),
                "hasMore": has_more,
            }))
        }
        methods::GET_ACTIVE_PARTICIPANTS => {
            let active: ActiveParticipantsParams = parse(params)?;
            let participants: Vec<&Participant> = world
                .participants
                .iter()
                .filter(|p| p.last_input_at > active.threshold)
                .collect();
            Ok(json!({ "participants": participants, "total": participants.len(), "hasMore": false }))
        }
        methods::UPDATE_PARTICIPANTS => {
            let batch: ParticipantsParams = parse(params)?;
            for update in &batch.participants {
                let Some(existing) = world
                    .participants
                    .iter_mut()
                    .find(|p| p.session_id == update.session_id)
                else {
                    return Err(ReplyError::new(
                        error_codes::UNKNOWN_PARTICIPANT,
                        "unknown participant",
                    ));
                };
                *existing = update.clone();
            }
            Ok(to_value(&batch))
        }

        methods::SET_BANDWIDTH_THROTTLE => {
            let limits: BTreeMap<String, ThrottleLimit> = parse(params)?;
            for (method, limit) in limits {
                world.throttles.insert(
                    method,
                    ThrottleState {
                        capacity_per_period: limit.capacity_per_period,
                        period_millis: limit.period_millis,
                        inserted: 0,
                        rejected: 0,
                    },
                );
            }
            Ok(json!({}))
        }
        methods::GET_THROTTLE_STATE => Ok(to_value(&world.throttles)),

        methods::CAPTURE => {
            let capture: CaptureParams = parse(params)?;
            if capture.transaction_id == "stale" {
                return Err(ReplyError::new(
                    error_codes::INVALID_TRANSACTION,
                    "unknown transaction",
                ));
            }
            Ok(json!({}))
        }

        _ => Err(ReplyError::new(error_codes::UNKNOWN_METHOD, "unknown method")),
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, ReplyError> {
    serde_json::from_value(params)
        .map_err(|e| ReplyError::new(error_codes::INVALID_PARAMS, e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}
