//! Terminal softphone: stdin commands in, call events out.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use ringline_call::{
    CallDeps, CallEvent, CallHandle, CallSession, CallState, Direction, HttpCredentialService,
    MediaAdapter, MediaEvent, MediaSettings, SignalingClient, SignalingConfig, SignalingEvent,
    SignalingOnlyTransport, TracingCallLog,
};
use ringline_common::{Identity, RinglineError};
use ringline_config::RinglineConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, RwLock};

use crate::commands::{Command, HELP};

type Online = Arc<RwLock<BTreeSet<Identity>>>;

/// Who this softphone registers as.
#[derive(Debug, Clone)]
pub struct Profile {
    pub identity: Identity,
    pub display_name: String,
}

pub async fn run(config: RinglineConfig, profile: Profile) -> ringline_common::Result<()> {
    let mut signaling_config = SignalingConfig::from_client_config(&config.client);
    signaling_config.identity = profile.identity.clone();
    let (signaling, signal_rx) = SignalingClient::connect(signaling_config);

    let credentials = HttpCredentialService::from_config(&config.media)
        .map_err(|e| RinglineError::Media(e.to_string()))?;
    let media = MediaAdapter::new(
        Arc::new(credentials),
        Arc::new(SignalingOnlyTransport),
        MediaSettings::from_config(&config.media),
    );

    let (calls, call_rx) = CallHandle::spawn(CallDeps {
        identity: profile.identity.clone(),
        display_name: profile.display_name.clone(),
        signals: Arc::new(signaling.clone()),
        media,
        call_log: Arc::new(TracingCallLog),
        ring_timeout: config.call.ring_timeout(),
    });

    let online: Online = Arc::new(RwLock::new(BTreeSet::new()));
    tokio::spawn(pump_signaling(signal_rx, calls.clone(), Arc::clone(&online)));
    tokio::spawn(print_call_events(call_rx));

    println!("ringline as {} ({})", profile.identity, profile.display_name);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(&calls, &online, command).await,
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }

    tracing::info!("Shutting down softphone");
    calls.shutdown().await;
    signaling.disconnect().await;
    Ok(())
}

async fn execute(calls: &CallHandle, online: &Online, command: Command) {
    let result = match command {
        Command::Dial(to) => calls
            .dial(to.clone())
            .await
            .map(|channel| println!("calling {to}... (channel {channel})")),
        Command::Accept => calls.accept().await,
        Command::Decline => calls.decline().await,
        Command::HangUp => calls.hang_up().await,
        Command::Status => match calls.snapshot().await {
            Ok(session) => {
                println!("{}", status_line(session.as_ref()));
                println!("{}", online_line(&*online.read().await));
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = result {
        println!("! {e}");
    }
}

/// Route relay events: signals to the controller, presence to the roster.
async fn pump_signaling(mut rx: mpsc::Receiver<SignalingEvent>, calls: CallHandle, online: Online) {
    while let Some(event) = rx.recv().await {
        match event {
            SignalingEvent::Signal(message) => {
                if calls.deliver(message).await.is_err() {
                    break;
                }
            }
            SignalingEvent::Registered(identity) => println!("registered as {identity}"),
            SignalingEvent::PresenceOnline(identity) => {
                println!("{identity} is online");
                online.write().await.insert(identity);
            }
            SignalingEvent::PresenceOffline(identity) => {
                println!("{identity} went offline");
                online.write().await.remove(&identity);
            }
            SignalingEvent::ServerError(message) => println!("relay: {message}"),
            SignalingEvent::Connected => tracing::debug!("Relay socket open"),
            SignalingEvent::Disconnected => {
                online.write().await.clear();
                println!("disconnected from relay");
            }
            SignalingEvent::Error(e) => println!("relay unreachable: {e}"),
        }
    }
}

async fn print_call_events(mut rx: mpsc::Receiver<CallEvent>) {
    while let Some(event) = rx.recv().await {
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

/// One line of user-facing text for a call event, if it deserves one.
pub fn describe(event: &CallEvent) -> Option<String> {
    match event {
        CallEvent::StateChanged { state, .. } => match state {
            CallState::OutgoingRinging => Some("ringing...".into()),
            CallState::Active => Some("call connected".into()),
            _ => None,
        },
        CallEvent::IncomingCall {
            caller,
            caller_display_name,
            ..
        } => Some(format!(
            "incoming call from {caller_display_name} ({caller}); accept or decline?"
        )),
        CallEvent::BusyRejected { caller, .. } => Some(format!("missed call from {caller} (busy)")),
        CallEvent::CallEnded(summary) => {
            let peer = match summary.direction {
                Direction::Outgoing => &summary.callee,
                Direction::Incoming => &summary.caller,
            };
            Some(format!(
                "call with {peer} ended: {} ({}s)",
                summary.reason, summary.duration_seconds
            ))
        }
        CallEvent::Media { event, .. } => match event {
            MediaEvent::Connected => Some("audio connected".into()),
            MediaEvent::Error(e) => Some(format!("audio unavailable ({e}); call continues")),
            MediaEvent::RemoteStreamAdded(id) => Some(format!("remote audio {id} started")),
            MediaEvent::RemoteStreamRemoved(id) => Some(format!("remote audio {id} stopped")),
            MediaEvent::CredentialRetry { .. } | MediaEvent::Disconnected => None,
        },
    }
}

pub fn status_line(session: Option<&CallSession>) -> String {
    let Some(session) = session else {
        return "idle".into();
    };
    let peer = session.peer();
    match session.state {
        CallState::OutgoingRinging => format!("calling {peer}"),
        CallState::IncomingRinging => format!("{peer} is calling"),
        CallState::Active => match session.answered_at {
            Some(answered) => {
                let secs = (Utc::now() - answered).num_seconds().max(0);
                format!("in call with {peer} ({secs}s)")
            }
            None => format!("in call with {peer}"),
        },
        CallState::Idle | CallState::Ended => "idle".into(),
    }
}

fn online_line(online: &BTreeSet<Identity>) -> String {
    if online.is_empty() {
        return "nobody else online".into();
    }
    let names: Vec<&str> = online.iter().map(Identity::as_str).collect();
    format!("online: {}", names.join(", "))
}
