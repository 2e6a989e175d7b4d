//! Dump and format fixture pages from the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ttx_fmt::driver::{format_page, FetchParams, Level};
use ttx_fmt::fonts::Latin1CharacterSet;
use ttx_fmt::page::{MagazineTable, Pgno, Subno};
use ttx_fmt::tools::{render_plain_text, Fixture, FixtureCache};
use ttx_fmt::triplet::Triplet;

/// Format or inspect a teletext page fixture.
#[derive(Clone, Debug, Parser)]
struct Args {
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Run a fixture page through the full formatter and print the result.
    FormatPage(FormatPageArgs),
    /// Print the raw X/26 triplet stream of a fixture page.
    DumpTriplets(DumpTripletsArgs),
}

#[derive(Clone, Debug, Parser)]
struct FormatPageArgs {
    /// fixture file (JSON, see `tools::Fixture`)
    fixture: PathBuf,
    /// page number to format, hex or decimal
    #[arg(long, value_parser = parse_pgno)]
    pgno: Pgno,
    /// subpage number, defaults to 0
    #[arg(long, default_value_t = 0)]
    subno: Subno,
    #[arg(long, value_enum, default_value_t = LevelArg::L3_5)]
    level: LevelArg,
    #[arg(long, default_value_t = 25)]
    rows: usize,
    #[arg(long)]
    nav: bool,
    /// print the full `Page` structure as JSON instead of plain text
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Debug, Parser)]
struct DumpTripletsArgs {
    fixture: PathBuf,
    #[arg(long, value_parser = parse_pgno)]
    pgno: Pgno,
    #[arg(long, default_value_t = 0)]
    subno: Subno,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
#[allow(non_camel_case_types)]
enum LevelArg {
    #[value(name = "1.0")]
    L1_0,
    #[value(name = "1.5")]
    L1_5,
    #[value(name = "2.5")]
    L2_5,
    #[value(name = "3.5")]
    L3_5,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Level {
        match level {
            LevelArg::L1_0 => Level::L1_0,
            LevelArg::L1_5 => Level::L1_5,
            LevelArg::L2_5 => Level::L2_5,
            LevelArg::L3_5 => Level::L3_5,
        }
    }
}

fn parse_pgno(s: &str) -> Result<Pgno, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else {
        u16::from_str_radix(s, 16)
    };
    parsed.map_err(|e| e.to_string())
}

fn format_page_cmd(args: &FormatPageArgs) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let cache = FixtureCache::new(&fixture);
    let fonts = Latin1CharacterSet;

    let mut magazines = MagazineTable::default();
    let idx = ((args.pgno >> 8) & 7) as usize;
    magazines.magazines[idx] = fixture.magazine.clone();
    magazines.magazines[0] = fixture.magazine.clone();

    let params = FetchParams {
        pgno: args.pgno,
        subno: args.subno,
        max_level: args.level.into(),
        display_rows: args.rows,
        navigation: args.nav,
    };

    let page = format_page(&cache, &magazines, &fonts, &params)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print!("{}", render_plain_text(&page));
    }
    Ok(())
}

fn dump_triplets_cmd(args: &DumpTripletsArgs) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let raw = fixture.page(args.pgno, args.subno)?;

    for designation in 0..raw.enhancement.len() {
        if raw.enhancement_present & (1 << designation) == 0 {
            continue;
        }
        for triplet in &raw.enhancement[designation] {
            print_triplet(designation, triplet);
        }
    }
    Ok(())
}

fn print_triplet(designation: usize, triplet: &Triplet) {
    println!(
        "designation={designation:2} address={:2} mode={:#04x} data={:#04x}",
        triplet.address, triplet.mode, triplet.data
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    match &args.operation {
        Operation::FormatPage(format_args) => format_page_cmd(format_args),
        Operation::DumpTriplets(dump_args) => dump_triplets_cmd(dump_args),
    }
}
