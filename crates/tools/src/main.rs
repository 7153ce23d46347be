use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foundation::math::LngLat;
use tools::{ToolError, dialog_text, inspect, style_json, tileset_summary};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Style, picking and tileset utilities for the 3D map component")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the vector-building style document
    Style {
        /// Highlight color for the selected building (e.g. #ff8800)
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Click a GeoJSON building layer at a position and print the info dialog
    Inspect {
        /// GeoJSON FeatureCollection with building polygons
        geojson: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Print the dialog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a 3D Tiles tileset.json
    Tileset {
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(args: Args) -> Result<(), ToolError> {
    match args.command {
        Command::Style { highlight } => {
            println!("{}", style_json(highlight.as_deref())?);
        }
        Command::Inspect {
            geojson,
            lng,
            lat,
            json,
        } => {
            let text = fs::read_to_string(&geojson)?;
            match inspect(&text, LngLat::new(lng, lat))? {
                Some(dialog) if json => println!("{}", to_json(&dialog)),
                Some(dialog) => print!("{}", dialog_text(&dialog)),
                None => println!("no feature"),
            }
        }
        Command::Tileset { path, json } => {
            let summary = tileset_summary(&fs::read_to_string(&path)?)?;
            if json {
                println!("{}", to_json(&summary));
            } else {
                println!(
                    "{}: version {}, {} tiles, {} leaves, {} unplaced",
                    path.display(),
                    summary.version,
                    summary.tiles,
                    summary.leaves.len(),
                    summary.unplaced
                );
                for leaf in &summary.leaves {
                    println!(
                        "  {}  [{:.6}, {:.6}, {:.6}, {:.6}]  {:.1}..{:.1} m",
                        leaf.uri, leaf.west, leaf.south, leaf.east, leaf.north, leaf.min_height, leaf.max_height
                    );
                }
            }
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
