/// Preview: interactive shell for driving and merging narratives.
///
/// Usage: preview [--config <path>] [--catalog <path>] [--seed <n>] [--genre <g>] [--mood <m>]
///
/// Commands:
///   scroll <amount>         scroll the active narrative
///   click <x> <y>           click
///   key <k>                 key press (mood shortcuts: m a d w r s p)
///   json <record>           raw interaction record, e.g. {"type":"scroll","amount":300}
///   mood <name>             set mood
///   genre <name>            set genre
///   new [genre] [mood]      start another narrative and make it active
///   use <id>                switch the active narrative
///   merge <id>              request merging narrative <id> into the active one
///   accept <req> / reject <req>
///   pending                 merge requests waiting on the active narrative
///   summary                 context of the active narrative
///   list                    live narratives
///   restart / end           restart or end the active narrative
///   bulk <n>                n random interactions with phase statistics
///   help / quit

use infinite_story::core::engine::{Continuation, StoryEngine};
use infinite_story::core::store::NarrativeStore;
use infinite_story::schema::interaction::Interaction;
use infinite_story::schema::merge::{MergeDecision, MergeRequestId};
use infinite_story::schema::segment::{NarrativeId, Segment};
use infinite_story::schema::story::{Genre, Mood, NarrativePhase};
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut config_path = None;
    let mut catalog_path = None;
    let mut seed: Option<u64> = None;
    let mut genre: Option<Genre> = None;
    let mut mood: Option<Mood> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--catalog" if i + 1 < args.len() => {
                i += 1;
                catalog_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().ok();
            }
            "--genre" if i + 1 < args.len() => {
                i += 1;
                genre = parse_or_exit(&args[i]);
            }
            "--mood" if i + 1 < args.len() => {
                i += 1;
                mood = parse_or_exit(&args[i]);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = StoryEngine::builder();
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    if let Some(ref path) = catalog_path {
        builder = builder.catalog_path(path);
    }
    let engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let store = NarrativeStore::new(Arc::new(engine));
    let mut active = match store.start(seed, genre, mood) {
        Ok((id, opening)) => {
            print_segment(&opening);
            id
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(seed) = seed {
        println!("Seed: {}", seed);
    }
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", active);
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "scroll" => {
                let amount = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(120.0);
                step(&store, active, &Interaction::scroll(amount));
            }
            "click" => {
                let x = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0.0);
                let y = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.0);
                step(&store, active, &Interaction::click(x, y));
            }
            "key" => match parts.get(1) {
                Some(key) => step(&store, active, &Interaction::keypress(*key)),
                None => println!("Usage: key <k>"),
            },
            "json" => {
                let record = line[cmd.len()..].trim();
                step(&store, active, &Interaction::from_json_lossy(record));
            }
            "mood" | "genre" => {
                let Some(value) = parts.get(1) else {
                    println!("Usage: {} <name>", cmd);
                    continue;
                };
                let result = if cmd == "mood" {
                    store.set_mood(active, value)
                } else {
                    store.set_genre(active, value)
                };
                match result {
                    Ok(()) => println!("{} set to {}", cmd, value.to_lowercase()),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "new" => {
                let genre = parts.get(1).and_then(|s| s.parse::<Genre>().ok());
                let mood = parts.get(2).and_then(|s| s.parse::<Mood>().ok());
                match store.start(None, genre, mood) {
                    Ok((id, opening)) => {
                        active = id;
                        print_segment(&opening);
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "use" => match parts.get(1).and_then(|s| parse_narrative(s)) {
                Some(id) if store.contains(id) => {
                    active = id;
                    println!("Active narrative: {}", id);
                }
                _ => println!("Usage: use <id> (see 'list')"),
            },
            "merge" => match parts.get(1).and_then(|s| parse_narrative(s)) {
                Some(source) => match store.request_merge(source, active) {
                    Ok(request) => println!(
                        "Merge requested: {} ({} -> {})",
                        request.id, request.source, request.target
                    ),
                    Err(e) => println!("ERROR: {}", e),
                },
                None => println!("Usage: merge <source id>"),
            },
            "accept" | "reject" => {
                let decision = if cmd == "accept" {
                    MergeDecision::Accept
                } else {
                    MergeDecision::Reject
                };
                let Some(id) = parts.get(1).and_then(|s| parse_request(s)) else {
                    println!("Usage: {} <request id> (see 'pending')", cmd);
                    continue;
                };
                match store.resolve_merge(id, decision) {
                    Ok(outcome) => {
                        println!("{} is now {:?}", outcome.request.id, outcome.request.status);
                        if let Some(segment) = outcome.segment {
                            print_segment(&segment);
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "pending" => {
                let pending = store.pending_merges(active);
                if pending.is_empty() {
                    println!("No pending merges.");
                }
                for request in pending {
                    println!("  {} from {}: {}", request.id, request.source, request.source_segment.content);
                }
            }
            "summary" => match store.summary(active) {
                Ok(summary) => match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("ERROR: {}", e),
                },
                Err(e) => println!("ERROR: {}", e),
            },
            "list" => {
                for id in store.ids() {
                    let marker = if id == active { "*" } else { " " };
                    match store.summary(id) {
                        Ok(s) => println!(
                            "{} {} {} / {} tension={:.2} {} words={}",
                            marker, id, s.genre, s.mood, s.tension, s.phase, s.length
                        ),
                        Err(e) => println!("{} {} ERROR: {}", marker, id, e),
                    }
                }
            }
            "restart" => match store.restart(active) {
                Ok(opening) => print_segment(&opening),
                Err(e) => println!("ERROR: {}", e),
            },
            "end" => {
                match store.end(active) {
                    Ok(summary) => println!("Ended {} after {} words.", active, summary.length),
                    Err(e) => println!("ERROR: {}", e),
                }
                match store.ids().first() {
                    Some(&next) => {
                        active = next;
                        println!("Active narrative: {}", active);
                    }
                    None => {
                        println!("No narratives left.");
                        break;
                    }
                }
            }
            "bulk" => {
                let count: usize = match parts.get(1).and_then(|s| s.parse().ok()) {
                    Some(n) if n > 0 => n,
                    _ => {
                        println!("Usage: bulk <n>");
                        continue;
                    }
                };
                bulk(&store, active, count, seed);
            }
            _ => {
                println!("Unknown command: '{}'. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn step(store: &NarrativeStore, id: NarrativeId, interaction: &Interaction) {
    match store.continue_narrative(id, interaction) {
        Ok(Continuation::Segment(segment)) => {
            print_segment(&segment);
            if let Ok(s) = store.summary(id) {
                println!("  [{} / {} | tension {:.2} | {}]\n", s.genre, s.mood, s.tension, s.phase);
            }
        }
        Ok(Continuation::Finished) => println!("The story has reached its end. Try 'restart' or 'new'."),
        Err(e) => println!("ERROR: {}", e),
    }
}

fn bulk(store: &NarrativeStore, id: NarrativeId, count: usize, seed: Option<u64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed.unwrap_or(42));
    let mut phase_counts: HashMap<NarrativePhase, usize> = HashMap::new();
    let mut openings: HashMap<String, usize> = HashMap::new();
    let mut produced = 0;

    for _ in 0..count {
        let interaction = match rng.gen_range(0..10) {
            0..=5 => Interaction::scroll(rng.gen_range(20.0..400.0)),
            6..=8 => Interaction::click(0.0, 0.0),
            _ => Interaction::keypress(Mood::ALL[rng.gen_range(0..Mood::ALL.len())].shortcut().to_string()),
        };
        match store.continue_narrative(id, &interaction) {
            Ok(Continuation::Segment(segment)) => {
                produced += 1;
                let opening: String = segment.content.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
                *openings.entry(opening).or_default() += 1;
                if let Ok(s) = store.summary(id) {
                    *phase_counts.entry(s.phase).or_default() += 1;
                }
            }
            Ok(Continuation::Finished) => break,
            Err(e) => {
                println!("ERROR: {}", e);
                return;
            }
        }
    }

    println!("\n=== Bulk: {} of {} interactions produced segments ===", produced, count);
    for phase in NarrativePhase::ALL {
        println!("  {:<10} {}", phase, phase_counts.get(&phase).copied().unwrap_or(0));
    }
    println!("  Distinct openings: {}", openings.len());
    if let Some((text, n)) = openings.iter().max_by_key(|(_, n)| **n) {
        println!("  Most repeated: \"{}\" x{}", text, n);
    }
    println!();
}

fn print_segment(segment: &Segment) {
    let marker = if segment.is_merged { " (merged)" } else { "" };
    println!("\n#{}{}", segment.sequence_number, marker);
    println!("{}\n", segment.content);
}

fn parse_or_exit<T: std::str::FromStr>(value: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match value.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

/// Accepts `3` or `narrative-3`.
fn parse_narrative(value: &str) -> Option<NarrativeId> {
    value.trim_start_matches("narrative-").parse().ok().map(NarrativeId)
}

/// Accepts `2` or `merge-2`.
fn parse_request(value: &str) -> Option<MergeRequestId> {
    value.trim_start_matches("merge-").parse().ok().map(MergeRequestId)
}

fn print_usage() {
    println!("Usage: preview [--config <path>] [--catalog <path>] [--seed <n>] [--genre <g>] [--mood <m>]");
    println!();
    println!("Options:");
    println!("  --config <path>   Pacing configuration (RON)");
    println!("  --catalog <path>  Fragment catalog layered over the builtin one (RON)");
    println!("  --seed <n>        Seed for the first narrative");
    println!("  --genre <g>       fantasy, scifi, horror, romance, adventure, mystery");
    println!("  --mood <m>        mysterious, adventurous, dark, whimsical, romantic, suspenseful, philosophical");
    println!();
    println!("Set RUST_LOG=infinite_story=debug to trace phase transitions.");
}

fn print_help() {
    println!("Commands:");
    println!("  scroll <amount>      Scroll the active narrative (default 120)");
    println!("  click <x> <y>        Click");
    println!("  key <k>              Key press; m a d w r s p force a mood");
    println!("  json <record>        Raw interaction record");
    println!("  mood <name>          Set mood");
    println!("  genre <name>         Set genre");
    println!("  new [genre] [mood]   Start another narrative");
    println!("  use <id>             Switch active narrative");
    println!("  merge <id>           Request merging narrative <id> into the active one");
    println!("  accept <req>         Accept a merge request");
    println!("  reject <req>         Reject a merge request");
    println!("  pending              Pending merges for the active narrative");
    println!("  summary              Show the active context");
    println!("  list                 List live narratives");
    println!("  restart              Restart the active narrative");
    println!("  end                  End the active narrative");
    println!("  bulk <n>             Run n random interactions and print statistics");
    println!("  help                 Show this help");
    println!("  quit                 Exit");
}
