// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use keytone::audio;
use keytone::config::KeytoneConfig;
use keytone::controller::{terminal, EngineStatus};
use keytone::notes::NoteMap;
use keytone::samples::{Fetcher, SampleLoader};
use keytone::session::Session;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sampled piano played from the computer keyboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays the piano from this terminal. Esc or Ctrl-C quits.
    Play {
        /// The path to the keytone config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The audio device to play through.
        #[arg(short, long)]
        device: Option<String>,
        /// The sample location template, e.g. ./samples/{note}{octave}.mp3.
        #[arg(short, long)]
        samples: Option<String>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the key to note mapping.
    Notes {},
    /// Loads every sample and reports which ones failed, without playing.
    Check {
        /// The path to the keytone config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The sample location template.
        #[arg(short, long)]
        samples: Option<String>,
    },
}

fn load_config(
    path: Option<PathBuf>,
    samples: Option<String>,
) -> Result<KeytoneConfig, Box<dyn Error>> {
    let mut config = match path {
        Some(path) => KeytoneConfig::deserialize(&path)?,
        None => KeytoneConfig::default(),
    };
    if let Some(samples) = samples {
        config = config.with_url_template(samples);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr so they stay out of the status line.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config,
            device,
            samples,
        } => {
            let mut config = load_config(config, samples)?;
            if let Some(device) = device {
                config = config.with_device(device);
            }

            let driver = Arc::new(terminal::Driver::new(config.keyboard().hold_timeout()?));
            println!("Loading samples from {}", config.samples().url_template());
            print_notes(&NoteMap::standard());
            println!("Press Esc or Ctrl-C to quit.");

            let mut session = Session::start(&config, driver)?;
            let status = tokio::spawn(show_status(session.notes(), session.subscribe()));
            session.join().await?;
            status.abort();
            println!();
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Notes {} => print_notes(&NoteMap::standard()),
        Commands::Check { config, samples } => {
            let config = load_config(config, samples)?;
            let template = config.samples().url_template();
            let fetcher = Fetcher::for_template(template, config.samples().fetch_timeout()?)?;
            let loader = SampleLoader::new(fetcher, template, None);

            let notes = NoteMap::standard();
            let samples = loader.load_all(&notes).await;
            println!("Loaded {} of {} samples.", samples.len(), notes.len());
            for (key, note) in notes.iter() {
                match samples.get(*key) {
                    Some(buffer) => println!(
                        "- {} ({}): {:.2}s, {} channel(s), {} Hz",
                        note,
                        key,
                        buffer.duration().as_secs_f32(),
                        buffer.channel_count(),
                        buffer.sample_rate()
                    ),
                    None => println!("- {} ({}): missing", note, key),
                }
            }

            if samples.len() != notes.len() {
                return Err(format!("{} samples failed to load", notes.len() - samples.len()).into());
            }
        }
    }

    Ok(())
}

fn print_notes(notes: &NoteMap) {
    println!("Keys:");
    for (key, note) in notes.iter() {
        println!(
            "  {}  {:<4} {:>7.2} Hz  {:?}",
            key,
            note.to_string(),
            note.frequency(),
            note.color()
        );
    }
}

/// Redraws a one-line status whenever the engine status changes.
async fn show_status(notes: NoteMap, mut status: watch::Receiver<EngineStatus>) {
    while status.changed().await.is_ok() {
        let line = status_line(&notes, &status.borrow_and_update());
        let _ = execute!(
            io::stdout(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        );
    }
}

fn status_line(notes: &NoteMap, status: &EngineStatus) -> String {
    if !status.ready {
        return "loading samples...".to_string();
    }

    let held: Vec<String> = status
        .pressed
        .iter()
        .filter_map(|key| notes.get(*key))
        .map(|note| note.to_string())
        .collect();
    format!(
        "samples: {}/{}  held: [{}]  voices: {}",
        status.samples,
        notes.len(),
        held.join(" "),
        status.voices
    )
}
