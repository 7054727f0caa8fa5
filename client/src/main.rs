use std::time::Instant;

use foosball_client::autopilot::Autopilot;
use foosball_client::config::ClientConfig;
use foosball_client::connection::{NetEvent, ServerConnection};
use foosball_client::peer::PeerSession;
use foosball_client::physics::{KinematicTable, TablePhysics};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid client configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Connecting to {}", config.ws_url);
    let mut conn = ServerConnection::connect(&config.ws_url);
    let mut peer = PeerSession::new(KinematicTable::default());
    let mut pilot = Autopilot::default();

    let frame = config.frame_duration();
    let dt = frame.as_secs_f64();
    let mut connected = false;
    let mut result_shown_at: Option<Instant> = None;

    loop {
        let started = Instant::now();

        for evt in conn.poll_events() {
            match evt {
                NetEvent::Connected => connected = true,
                NetEvent::Message(msg) => peer.handle(msg),
                NetEvent::ProtocolMismatch { server, client } => {
                    tracing::error!("Protocol mismatch: server {}, client {}", server, client);
                    std::process::exit(1);
                }
                NetEvent::Disconnected => {
                    tracing::info!("Final score {}", peer.score());
                    std::process::exit(if connected { 0 } else { 1 });
                }
            }
        }

        if config.autopilot {
            if let Some(rods) = peer.rods() {
                let ball = peer.physics().ball();
                for cmd in pilot.update(dt, &ball, rods) {
                    if let Err(e) = peer.move_rod(cmd.rod, cmd.x, cmd.rotation) {
                        tracing::warn!("Autopilot move rejected: {}", e);
                    }
                }
            }
        }

        if let Some(result) = peer.frame(dt) {
            tracing::info!(
                "Match over, {} wins {} ({:?})",
                result.winner,
                peer.score(),
                peer.outcome()
            );
            result_shown_at = Some(Instant::now());
        }

        if let (Some(delay), Some(shown)) = (config.auto_restart, result_shown_at) {
            if shown.elapsed() >= delay && peer.restart_match() {
                tracing::info!("Starting a new match");
                result_shown_at = None;
            }
        }

        for msg in peer.drain_outbox() {
            conn.send(msg);
        }

        std::thread::sleep(frame.saturating_sub(started.elapsed()));
    }
}
