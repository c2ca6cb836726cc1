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
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};

use gmplay::backend::BackendKind;
use gmplay::config::Config;
use gmplay::loader::ProgressFn;
use gmplay::sampler::AudioFormat;
use gmplay::{audio, capability, gm, midi, util};
use gmplay::{InitOptions, Player};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A General MIDI soundfont player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Probes the host for playback capabilities.
    Probe {},
    /// Lists the General MIDI instruments.
    Instruments {},
    /// Plays notes through the best available backend.
    Play {
        /// The path to the player config.
        #[arg(short, long)]
        config: Option<String>,
        /// The backend to use (midi, sampler, stream).
        #[arg(short, long)]
        backend: Option<String>,
        /// The soundfont encoding to use (ogg, mp3, wav).
        #[arg(short, long)]
        format: Option<String>,
        /// The instruments to load, by GM id or program number.
        #[arg(short, long)]
        instrument: Vec<String>,
        /// The notes to play, as note numbers or key names ("C4,E4,G4").
        notes: String,
        /// The note velocity.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
        /// How long to hold the notes, in seconds.
        #[arg(short, long, default_value_t = 2.0)]
        duration: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
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
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Probe {} => {
            let capabilities = capability::detect().await;
            print!("{}", capabilities);
        }
        Commands::Instruments {} => {
            for instrument in gm::all_instruments() {
                println!("{:3} {}", instrument.number, instrument.id);
            }
        }
        Commands::Play {
            config,
            backend,
            format,
            instrument,
            notes,
            velocity,
            duration,
        } => {
            let notes = util::parse_note_list(&notes)?;
            let backend = backend
                .map(|backend| backend.parse::<BackendKind>())
                .transpose()?;
            let format = format
                .map(|format| format.parse::<AudioFormat>())
                .transpose()?;

            let config = Config::load(config.as_deref())?;
            let player = Player::new(config);

            let on_progress: ProgressFn = Arc::new(|progress| {
                if let Some(instrument) = &progress.instrument {
                    println!("Loading {}: {:.0}%", instrument, progress.fraction * 100.0);
                } else {
                    println!("Loading: {:.0}%", progress.fraction * 100.0);
                }
            });
            let kind = player
                .initialize(InitOptions {
                    backend,
                    format,
                    instruments: instrument,
                    on_progress: Some(on_progress),
                    on_error: Some(Arc::new(|e| eprintln!("Load error: {}", e))),
                })
                .await?;
            println!("Connected backend: {}", kind);

            player.chord_on(0, &notes, velocity, 0.0);
            tokio::time::sleep(Duration::from_secs_f64(duration)).await;
            player.chord_off(0, &notes, 0.0);

            // Let release tails finish before tearing the stream down.
            tokio::time::sleep(Duration::from_millis(600)).await;
            player.shutdown();
        }
    }

    Ok(())
}
