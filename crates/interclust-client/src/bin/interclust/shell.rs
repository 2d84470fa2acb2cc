//! Interactive console: one thread owns the session, stdin and the broker
//! connection feed it through channels.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use interclust_client::console::{self, Command, Reply};
use interclust_client::mqtt::{self, LoopEvent, MqttTransport};
use interclust_client::{ClientConfig, DispatchOutcome, RecordingTransport, Session, SessionId};
use tracing::{debug, info, warn};

use crate::style::{self, Tone};

pub struct ShellOptions {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub offline: bool,
    pub verbose: bool,
}

pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<ClientConfig> {
    ClientConfig::discover(path.as_deref()).context("failed to load configuration")
}

pub fn init_logging(config: &ClientConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run_shell(options: ShellOptions) -> anyhow::Result<()> {
    let config = load_config(options.config)?
        .with_broker(options.host.as_deref(), options.port);
    init_logging(&config, options.verbose);

    let id = SessionId::generate();
    let mut recorder = None;
    let mut broker = None;
    let (session, events) = if options.offline {
        let transport = RecordingTransport::new();
        recorder = Some(transport.clone());
        let session = Session::with_id(id, &config, Box::new(transport));
        (session, crossbeam_channel::never())
    } else {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (transport, _handle) = MqttTransport::connect(&config.broker, &id, events_tx)?;
        mqtt::wait_connected(&events_rx, config.broker.connect_timeout()).with_context(|| {
            format!(
                "no broker at {}:{}",
                config.broker.host, config.broker.port
            )
        })?;
        broker = Some(transport.clone());
        let session = Session::with_id(id, &config, Box::new(transport));
        (session, events_rx)
    };

    let mode = if options.offline {
        "offline".to_string()
    } else {
        format!("{}:{}", config.broker.host, config.broker.port)
    };
    println!(
        "{}",
        style::out(Tone::Ok, format!("interclust session {} ({mode})", session.id()))
    );
    println!("{}", style::out(Tone::Muted, "type 'help' for commands"));

    let lines = spawn_stdin()?;
    let result = event_loop(session, &lines, &events, recorder.as_ref());
    if let Some(broker) = broker {
        broker.disconnect();
    }
    result
}

fn spawn_stdin() -> anyhow::Result<Receiver<String>> {
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("interclust-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn prompt() {
    print!("{} ", style::out(Tone::Accent, ">"));
    let _ = std::io::stdout().flush();
}

enum Step {
    Continue,
    Quit,
    BrokerGone,
}

fn event_loop(
    mut session: Session,
    lines: &Receiver<String>,
    events: &Receiver<LoopEvent>,
    recorder: Option<&RecordingTransport>,
) -> anyhow::Result<()> {
    let mut events = events.clone();
    prompt();
    loop {
        let step = crossbeam_channel::select! {
            recv(lines) -> line => match line {
                Ok(line) if handle_line(&mut session, &line, recorder) => Step::Quit,
                Ok(_) => {
                    prompt();
                    Step::Continue
                }
                Err(_) => {
                    debug!("stdin closed");
                    Step::Quit
                }
            },
            recv(events) -> event => match event {
                Ok(event) => {
                    on_broker_event(&mut session, event);
                    Step::Continue
                }
                Err(_) => Step::BrokerGone,
            },
        };
        match step {
            Step::Continue => {}
            Step::Quit => break,
            Step::BrokerGone => {
                warn!("connection thread stopped");
                events = crossbeam_channel::never();
            }
        }
    }
    info!(session = %session.id(), "session closed");
    Ok(())
}

/// Returns `true` when the shell should exit.
fn handle_line(session: &mut Session, line: &str, recorder: Option<&RecordingTransport>) -> bool {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(err) => {
            println!("{}", style::out(Tone::Fail, err.to_string()));
            return false;
        }
    };
    if let (Command::Sent, Some(recorder)) = (&command, recorder) {
        for message in recorder.messages() {
            println!("{} {}", style::out(Tone::Accent, &message.topic), message.payload);
        }
        return false;
    }
    match console::execute(session, command) {
        Ok(Reply::Text(text)) => println!("{}", text.trim_end()),
        Ok(Reply::Quit) => return true,
        Err(err) => println!("{}", style::out(Tone::Fail, err.to_string())),
    }
    false
}

fn on_broker_event(session: &mut Session, event: LoopEvent) {
    match event {
        LoopEvent::Connected => info!("reconnected to broker"),
        LoopEvent::Disconnected(reason) => warn!(reason = %reason, "broker connection lost"),
        LoopEvent::Inbound { topic, payload } => {
            match session.handle_inbound(&topic, &payload) {
                DispatchOutcome::Rejected(reason) => {
                    println!("{}", style::out(Tone::Warn, format!("engine message rejected: {reason}")));
                }
                outcome => debug!(topic = %topic, ?outcome, "engine message handled"),
            }
        }
    }
}
