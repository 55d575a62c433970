//! LiveQuest Server
//!
//! Connects to the configured chats, loads the last snapshot and runs the
//! game at a fixed tick rate until interrupted.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use live_quest::{
    AppConfig, VERSION,
    challenge::{ChallengeLoadError, ChallengeQueue, ChallengeSet, HttpPlayground},
    chat::{PlatformAdapter, StaticToken, TwitchClient, TwitchConfig, YoutubeAuth, YoutubeClient, YoutubeConfig},
    game::{Engine, EngineConfig, FightState, GameState},
    persistence::SnapshotStore,
};

/// Summary log cadence, in ticks.
const SUMMARY_INTERVAL: u64 = 600;

/// How long pending checks may run after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_level = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("reading configuration")?;
    info!("LiveQuest v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);

    let challenges = load_challenges(&config)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, "simulation seed");

    let store = SnapshotStore::new(config.snapshot_path.clone());
    let state = match store.load() {
        Ok(Some(snapshot)) => snapshot.restore(seed),
        Ok(None) => {
            info!(path = %store.path().display(), "no saved game, starting fresh");
            GameState::new(seed)
        }
        Err(e) => {
            error!(path = %store.path().display(), err = %e, "unable to load saved game, starting fresh");
            GameState::new(seed)
        }
    };

    let playground = HttpPlayground::new().context("building playground client")?;
    let (queue, queue_handle, outcomes) = ChallengeQueue::new(playground, challenges, state.used_refs.clone());
    let mut worker = tokio::spawn(queue.run());

    let adapters = connect_adapters(&config, &state.youtube_page_token);
    if adapters.is_empty() {
        warn!("no chat configured, the world will stay quiet");
    }

    let engine_config = EngineConfig::default();
    let mut engine = Engine::new(state, engine_config)
        .with_challenge_queue(queue_handle, outcomes)
        .with_store(store)
        .with_feedback(config.feedback);
    for adapter in adapters {
        engine = engine.with_adapter(adapter);
    }

    let tick_duration = Duration::from_micros(1_000_000 / config.tick_rate as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {}
            res = &mut shutdown => {
                if let Err(e) = res {
                    error!(err = %e, "unable to listen for shutdown signal");
                }
                break;
            }
        }

        let result = engine.update();
        for event in &result.events {
            debug!(tick = event.tick, uid = ?event.uid, data = ?event.data, "game event");
        }

        if engine.tick_count() % SUMMARY_INTERVAL == 0 {
            let fight = match engine.fight() {
                FightState::Idle => "idle".to_string(),
                FightState::InProgress { player1, player2, .. } => format!("{} vs {}", player1, player2),
            };
            let leader = engine.leaderboard().first().map(|v| format!("{} (level {}, {} XP)", v.name, v.level(), v.xp));
            info!(
                tick = engine.tick_count(),
                viewers = engine.viewers().count(),
                fighting_queue = engine.fighting_queue().len(),
                fight = %fight,
                leader = ?leader,
                "game summary"
            );
        }
    }

    info!("shutting down");
    engine.close_queue();
    match timeout(SHUTDOWN_GRACE, &mut worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(err = %e, "challenge queue ended abnormally"),
        Err(_) => {
            warn!(grace = ?SHUTDOWN_GRACE, "challenge queue still busy, abandoning pending checks");
            worker.abort();
        }
    }
    engine.apply_outcomes();
    engine.save().context("saving game on shutdown")?;
    Ok(())
}

fn load_challenges(config: &AppConfig) -> anyhow::Result<ChallengeSet> {
    match ChallengeSet::load(&config.challenges_path) {
        Ok(set) => {
            info!(path = %config.challenges_path.display(), challenges = set.len(), "challenges loaded");
            Ok(set)
        }
        Err(ChallengeLoadError::Io { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path, "no challenge file, !check is disabled");
            Ok(ChallengeSet::default())
        }
        Err(e) => Err(e).context("loading challenges"),
    }
}

/// Start every configured adapter. A platform that fails to start is
/// logged and left out.
fn connect_adapters(config: &AppConfig, page_token: &str) -> Vec<PlatformAdapter> {
    let mut adapters = Vec::new();

    match &config.twitch_token {
        Some(token) => {
            let twitch = TwitchConfig { channel: config.twitch_channel.clone(), ..TwitchConfig::default() };
            match TwitchClient::spawn(twitch, Arc::new(StaticToken::new(token.clone()))) {
                Ok(client) => adapters.push(PlatformAdapter::Twitch(client)),
                Err(e) => error!(err = %e, "twitch: unable to start"),
            }
        }
        None => info!("twitch: no token, disabled"),
    }

    if let Some(live_id) = &config.youtube_stream {
        let auth = match (&config.youtube_access_token, &config.youtube_api_key) {
            (Some(token), _) => Some(YoutubeAuth::Token(Arc::new(StaticToken::new(token.clone())))),
            (None, Some(key)) => Some(YoutubeAuth::ApiKey(key.clone())),
            (None, None) => None,
        };
        match auth {
            Some(auth) => {
                let youtube = YoutubeConfig { live_id: live_id.clone(), ..YoutubeConfig::default() };
                match YoutubeClient::spawn(youtube, auth, page_token.to_string()) {
                    Ok(client) => adapters.push(PlatformAdapter::Youtube(client)),
                    Err(e) => error!(err = %e, "youtube: unable to start"),
                }
            }
            None => warn!("youtube: stream set but no credentials, disabled"),
        }
    } else {
        info!("youtube: no stream, disabled");
    }

    adapters
}
