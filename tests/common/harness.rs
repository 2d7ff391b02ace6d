//! A complete bot over in-memory stores and recording transports.

use super::fakes::{RecordingChat, RecordingConsole};
use craftrelay::bot::{BotState, keys};
use craftrelay::bridge::{ChatBridge, Direction};
use craftrelay::commands::{CommandDispatcher, CommandRegistry, CommandResponse, Source};
use craftrelay::events::LogEventPipeline;
use craftrelay::identity::{Identity, IdentityRegistry, Level};
use craftrelay::store::{MemoryStore, Settings};
use craftrelay::world::WorldData;
use std::sync::Arc;
use std::time::Duration;

pub const BOT_NICK: &str = "relay";

#[allow(dead_code)]
pub struct Harness {
    pub console: Arc<RecordingConsole>,
    pub chat: Arc<RecordingChat>,
    pub pipeline: Arc<LogEventPipeline>,
    pub state: Arc<BotState>,
    pub dispatcher: CommandDispatcher,
    pub bridge: ChatBridge,
    pub settings_store: Arc<MemoryStore>,
    pub users_store: Arc<MemoryStore>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_world(world: Arc<dyn WorldData>) -> Self {
        Self::build(Some(world))
    }

    fn build(world: Option<Arc<dyn WorldData>>) -> Self {
        let settings_store = Arc::new(MemoryStore::new());
        let users_store = Arc::new(MemoryStore::new());
        let identities =
            IdentityRegistry::open(Settings::new(users_store.clone())).expect("identities");
        let settings = Settings::new(settings_store.clone());
        let language = Settings::new(Arc::new(MemoryStore::new()));

        let console = Arc::new(RecordingConsole::default());
        let chat = Arc::new(RecordingChat::default());
        let pipeline = LogEventPipeline::new();
        console.attach(&pipeline);

        let mut state = BotState::new(
            identities,
            settings,
            language,
            console.clone(),
            chat.clone(),
            pipeline.clone(),
        );
        if let Some(world) = world {
            state = state.with_world(world);
        }
        let state = Arc::new(state);
        state.settings.put(keys::CAPTURE_DELAY, 100);

        let registry =
            Arc::new(CommandRegistry::with_builtins(state.world.is_some()).expect("commands"));
        let dispatcher = CommandDispatcher::new(state.clone(), registry);
        let bridge = ChatBridge::new(dispatcher.clone(), BOT_NICK).expect("bridge");
        pipeline.subscribe(Arc::new(bridge.clone()));
        pipeline.start().expect("pipeline start");

        Self {
            console,
            chat,
            pipeline,
            state,
            dispatcher,
            bridge,
            settings_store,
            users_store,
        }
    }

    /// Register a chat user with `level`, optionally linked to a player.
    pub fn user(&self, nickname: &str, game_name: Option<&str>, level: Level) -> Identity {
        let identities = &self.state.identities;
        let identity = match game_name {
            Some(game) => identities.link(game, nickname),
            None => identities.register_from_chat(nickname),
        }
        .expect("register");
        identities.set_level(identity.id, level).expect("level")
    }

    pub fn mirror(&self, direction: Direction, enabled: bool) {
        self.state.set_mirror(direction, enabled).expect("mirror");
    }

    pub async fn dispatch(&self, text: &str, issuer: &str, source: Source) -> CommandResponse {
        self.dispatcher.dispatch(text, issuer, source).await
    }

    /// Submit console lines and wait until the worker handled them.
    pub async fn feed(&self, lines: &[String]) {
        for line in lines {
            self.pipeline.submit(line.clone());
        }
        self.pipeline.stop().await;
    }

    pub async fn shutdown(&self) {
        self.pipeline.stop().await;
    }
}

/// Poll `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
