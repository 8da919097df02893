//! Terminal front end: one line per command on stdin, engine events printed
//! as they arrive.

use lanchat::{
    capture::media_devices::MediaDevices,
    config::{CallConfig, Config},
    core::{engine::Engine, events::EngineEvent},
    log::{log_sink::LogSink, logger::Logger},
};
use std::{
    env,
    io::{self, BufRead},
    net::IpAddr,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

const TICK: Duration = Duration::from_millis(50);

const HELP: &str = "commands: scan | call <ip> | accept <ip> | decline <ip> | \
say <ip> <text> | hangup <ip> | calls | quit";

fn load_config() -> Config {
    let loaded = match env::args().nth(1) {
        Some(path) => {
            println!("Loading configuration from {path}");
            Config::load(&path)
        }
        None => Config::load("lanchat.conf").or_else(|_| Config::load("lanchat_default.conf")),
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("{e}. Using defaults.");
        Config::empty()
    });
    if let Err(e) = config.validate() {
        eprintln!("warning: {e}; the default is used instead");
    }
    config
}

fn parse_ip(arg: Option<&str>) -> Option<IpAddr> {
    let ip = arg.and_then(|a| a.parse().ok());
    if ip.is_none() {
        println!("expected an IP address");
    }
    ip
}

/// Returns `false` once the user asked to quit.
fn run_command(engine: &Engine, line: &str) -> bool {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let outcome = match cmd {
        "" => Ok(()),
        "quit" | "exit" => return false,
        "scan" => {
            let peers = engine.scan();
            if peers.is_empty() {
                println!("no one else on this network");
            }
            for p in peers {
                println!("  {}", p.ip);
            }
            Ok(())
        }
        "calls" => {
            for ip in engine.active_calls() {
                println!("  {ip} active");
            }
            for ip in engine.pending_calls() {
                println!("  {ip} ringing");
            }
            Ok(())
        }
        "call" => match parse_ip(Some(rest)) {
            Some(ip) => engine.call(ip),
            None => Ok(()),
        },
        "accept" => match parse_ip(Some(rest)) {
            Some(ip) => engine.accept_call(ip).map(|_| ()),
            None => Ok(()),
        },
        "decline" => match parse_ip(Some(rest)) {
            Some(ip) => engine.decline_call(ip),
            None => Ok(()),
        },
        "hangup" => match parse_ip(Some(rest)) {
            Some(ip) => engine.hang_up(ip),
            None => Ok(()),
        },
        "say" => {
            let (ip, text) = rest.split_once(' ').unwrap_or((rest, ""));
            match parse_ip(Some(ip)) {
                Some(ip) => engine.send_chat(ip, text.trim()),
                None => Ok(()),
            }
        }
        _ => {
            println!("{HELP}");
            Ok(())
        }
    };
    if let Err(e) = outcome {
        println!("error: {e}");
    }
    true
}

fn print_event(event: EngineEvent, frames: &mut u64) {
    match event {
        EngineEvent::IncomingCall {
            peer,
            from_hostname,
        } => println!("* {from_hostname} ({peer}) is calling. accept {peer} / decline {peer}"),
        EngineEvent::CallStarted { peer } => println!("* in call with {peer}"),
        EngineEvent::CallFailed { peer, reason } => println!("* call with {peer} failed: {reason}"),
        EngineEvent::ChatReceived { peer, content } => println!("{peer}: {content}"),
        EngineEvent::RemoteFrame { .. } => *frames += 1,
        EngineEvent::CallEnded { peer, reason } => {
            println!("* call with {peer} ended ({reason}), {frames} frames received");
            *frames = 0;
        }
        EngineEvent::Status(s) => println!("* {s}"),
    }
}

fn main() {
    let config = load_config();
    let logger = Logger::from_config(4096, 256, 50, &config);
    let sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let mut engine = match Engine::start(
        CallConfig::from_config(&config),
        MediaDevices::from_features(),
        sink,
    ) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    println!(
        "lanchat listening on {:?}, log at {}",
        engine.signaling_addr(),
        logger.file_path().display()
    );
    println!("{HELP}");

    let (line_tx, line_rx) = mpsc::channel::<String>();
    let spawned = thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    if let Err(e) = spawned {
        eprintln!("cannot read stdin: {e}");
        return;
    }

    let mut frames = 0u64;
    loop {
        match line_rx.recv_timeout(TICK) {
            Ok(line) => {
                if !run_command(&engine, &line) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        for event in engine.poll() {
            print_event(event, &mut frames);
        }
        while let Some(line) = logger.try_recv_ui() {
            println!("  | {line}");
        }
    }

    engine.shutdown();
    for event in engine.poll() {
        print_event(event, &mut frames);
    }
}
