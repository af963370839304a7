use anyhow::Result;
use chime::common::parse_clock_duration;
use chime::prelude::*;
use chime::{ENGINE_NAME, VERSION as LIB_VERSION};
use colored::Colorize;
use parking_lot::Mutex;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use slotmap::{new_key_type, SlotMap};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

new_key_type! {
    /// Identifies an event held by the shell.
    struct EventId;
}

type Events = Arc<Mutex<SlotMap<EventId, Event>>>;

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner(virtual_mode: bool) {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    // `logo.log` sits in the root of the `rdx-chimeshell` crate.
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-------------------------------------------------------------------".dimmed());
    println!("{}", version_string);
    if virtual_mode {
        println!("{}", "          Virtual clock: use 'advance <HH:MM:SS>' to move time.".dimmed());
    }
    println!("{}", "-------------------------------------------------------------------".dimmed());
}

fn print_help(virtual_mode: bool) {
    println!("Available commands:");
    println!("  add <rule> [param] [close]  - Creates an event (rules: timestamp, time-of-day, delay, sunset, sunrise).");
    println!("  list                        - Describes every event and its handle.");
    println!("  next <H>                    - Shows when event #H next occurs.");
    println!("  describe <H>                - Describes event #H right now.");
    println!("  wait <H>                    - Arms a waiter on event #H and reports when it fires.");
    println!("  remove <H>                  - Forgets event #H.");
    println!("  now                         - Shows the clock's current time.");
    if virtual_mode {
        println!("  advance <HH:MM:SS>          - Moves the virtual clock forward.");
    }
    println!("  exit                        - Quits the shell.");
}

/// Splits `add` arguments into a spec and the close flag.
///
/// Timestamps contain a space, so everything between the rule and an optional
/// trailing `close` is the parameter.
fn parse_add(args: &[&str]) -> Option<(EventSpec, bool)> {
    let (rule, rest) = args.split_first()?;
    let (close, rest) = match rest.split_last() {
        Some((&"close", init)) => (true, init),
        Some((&"open", init)) => (false, init),
        _ => (false, rest),
    };
    Some((EventSpec::new(*rule, rest.join(" ")), close))
}

#[tokio::main]
async fn main() -> Result<()> {
    let virtual_mode = env::var("CHIME_VIRTUAL").is_ok();
    print_banner(virtual_mode);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = ChimeConfig::load(Some(Path::new("chime.toml")))?;
    let mock: Option<Arc<MockClock>> =
        virtual_mode.then(|| Arc::new(config.mock_clock(chrono::Utc::now())));
    let clock: Arc<dyn Clock> = match &mock {
        Some(mock) => mock.clone(),
        None => Arc::new(config.system_clock()),
    };
    info!("{} clock running in {}.", ENGINE_NAME.cyan(), clock.location());

    // The shell's state management variables.
    let events: Events = Arc::new(Mutex::new(SlotMap::with_key()));
    let mut handles: BTreeMap<usize, EventId> = BTreeMap::new();
    let mut next_handle: usize = 0;

    for entry in &config.events {
        match Event::new(Some(&entry.spec), entry.close_event, clock.clone()) {
            Ok(event) => {
                let id = events.lock().insert(event);
                handles.insert(next_handle, id);
                println!("--> Loaded '{}' as handle #{}", entry.name, next_handle);
                next_handle += 1;
            }
            Err(e) => println!("Error: could not load '{}': {}", entry.name, e),
        }
    }

    let mut rl = Editor::new()?;
    let helper = MyHighlighter {};
    rl.set_helper(Some(helper));

    println!("{} shell is ready. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        let line = match readline {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting chimeshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        // Commands that take a handle resolve it up front.
        let handle = args
            .get(1)
            .and_then(|h| h.trim_start_matches('#').parse::<usize>().ok())
            .and_then(|h| handles.get(&h).copied().map(|id| (h, id)));

        match *command {
            "add" => match parse_add(&args[1..]) {
                Some((spec, close)) => match Event::new(Some(&spec), close, clock.clone()) {
                    Ok(event) => {
                        println!("--> {}", event);
                        let id = events.lock().insert(event);
                        handles.insert(next_handle, id);
                        println!("--> Added event with handle: #{}", next_handle);
                        next_handle += 1;
                    }
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: add <rule> [param] [close]"),
            },
            "list" => {
                let now = clock.now();
                let events = events.lock();
                println!("Events:");
                for (handle, id) in &handles {
                    if let Some(event) = events.get(*id) {
                        println!("  Handle #{}: {}", handle, event.describe_at(now));
                    }
                }
            }
            "next" | "describe" | "wait" | "remove" => {
                let Some((h, id)) = handle else {
                    println!("Usage: {} <HANDLE>. Use 'list' to see handles.", command);
                    continue;
                };
                match *command {
                    "next" => {
                        let now = clock.now();
                        if let Some(event) = events.lock().get(id) {
                            if event.has_final_event_occurred(now) {
                                println!("--> #{} has already had its final occurrence.", h);
                            } else {
                                println!("--> #{} next at {}", h, event.as_timestamp(now));
                            }
                        }
                    }
                    "describe" => {
                        if let Some(event) = events.lock().get(id) {
                            println!("--> {:?}", event);
                            println!("--> {}", event);
                        }
                    }
                    "wait" => {
                        let waiter = match events.lock().get(id) {
                            Some(event) => event.waiter(clock.now()),
                            None => continue,
                        };
                        println!("--> #{} armed for {}", h, waiter.target());
                        let events = events.clone();
                        tokio::spawn(async move {
                            if let Some(fired_at) = waiter.await {
                                println!("\n<-- [FIRED] #{} at {}\n>> ", h, fired_at);
                                if let Some(event) = events.lock().get_mut(id) {
                                    event.set_last_fired(fired_at);
                                }
                            }
                        });
                    }
                    _ => {
                        events.lock().remove(id);
                        handles.remove(&h);
                        println!("--> Event #{} removed.", h);
                    }
                }
            }
            "now" => println!("--> {}", clock.now().with_timezone(&clock.location())),
            "advance" => match (&mock, args.get(1).map(|s| parse_clock_duration(s))) {
                (Some(mock), Some(Ok(delta))) => {
                    mock.advance(delta);
                    println!("--> Clock is now {}", mock.now());
                }
                (Some(_), _) => println!("Usage: advance <HH:MM:SS>"),
                (None, _) => println!("Error: 'advance' needs the virtual clock (set CHIME_VIRTUAL)."),
            },
            "help" => print_help(virtual_mode),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line),
        }
    }

    Ok(())
}
