use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;

use crate::cli::context::Context;
use crate::cli::output::{self, create_standard_table, header_cell};

#[derive(Subcommand)]
pub enum SearchCommands {
    /// Look an antenna id up in the most recent data sets
    Antenna(AntennaArgs),

    /// List AM stations within a radius of a point
    Am(AmArgs),
}

#[derive(Args)]
pub struct AntennaArgs {
    pub antenna_id: String,
}

#[derive(Args)]
pub struct AmArgs {
    /// Latitude in decimal degrees, north positive
    #[arg(allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude in decimal degrees, east positive
    #[arg(allow_negative_numbers = true)]
    pub longitude: f64,

    /// Search radius in kilometres
    #[arg(long, default_value_t = 10.0)]
    pub radius_km: f64,
}

pub fn run(command: SearchCommands, ctx: &Context) -> Result<()> {
    match command {
        SearchCommands::Antenna(args) => antenna(args, ctx),
        SearchCommands::Am(args) => am(args, ctx),
    }
}

fn antenna(args: AntennaArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let matches = db.find_antennas(&ctx.root, &args.antenna_id)?;
    if matches.is_empty() {
        output::empty(&format!("No antenna with id {}", args.antenna_id.trim()));
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Data set"),
        header_cell("Antenna"),
        header_cell("Make"),
        header_cell("Model"),
    ]);
    for found in &matches {
        table.add_row(vec![
            format!("{} ({})", found.data_set_label, found.data_set_key),
            found.antenna_id.clone(),
            found.make.clone(),
            found.model.clone(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn am(args: AmArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let stations = db.am_stations_near(&ctx.root, args.latitude, args.longitude, args.radius_km)?;
    if stations.is_empty() {
        output::empty(&format!(
            "No AM stations within {} km of {:.4}, {:.4}",
            args.radius_km, args.latitude, args.longitude
        ));
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Callsign"),
        header_cell("Facility"),
        header_cell("City"),
        header_cell("Distance (km)"),
        header_cell("Data set"),
    ]);
    for station in &stations {
        table.add_row(vec![
            station.callsign.clone(),
            station.facility_id.to_string(),
            format!("{}, {}", station.city, station.state),
            format!("{:.1}", station.distance_km),
            station.data_set_key.to_string(),
        ]);
    }
    println!("{}", table);
    println!("{} station(s)", stations.len().to_string().cyan());
    Ok(())
}
