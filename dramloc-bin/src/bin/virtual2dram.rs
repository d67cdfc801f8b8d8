use std::io::{BufWriter, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dramloc_bin::{AddressRange, Registers, init_logging_with_progress, parse_addr, walk_range};
use dramloc_core::decode::DramDecoder;
use dramloc_core::memory::LinuxPageMap;
use dramloc_core::pci::{PciDevice, RegisterSnapshot};
use dramloc_core::report::{OutputMode, Report, TranslationRecord};
use dramloc_core::util::{
    AMD_VENDOR_ID, FAM10H_ADDRESS_MAP_DEVICE_ID, NamedProgress, Size, os_page_size,
};
use dramloc_sysfs::{SysfsRegisters, discover_nodes};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;

/// CLI arguments for the `virtual2dram` binary.
///
/// Translates the addresses `addr, addr + step, ...` below `addr + memsize` from virtual to
/// physical to DRAM addresses and prints one CSV row (or JSON record) per address.
#[derive(Debug, Parser, Serialize, Clone)]
#[clap(version, about)]
struct CliArgs {
    /// Process whose virtual addresses are translated.
    #[clap(long = "pid", required_unless_present = "p2d")]
    pid: Option<u32>,
    /// First address to translate (hex with 0x prefix, or decimal).
    #[clap(long = "addr", value_parser = parse_addr)]
    addr: u64,
    /// Page size used to index the pagemap (default: OS page size).
    #[clap(long = "pagesize")]
    page_size: Option<Size>,
    /// Size of the translated memory region.
    #[clap(long = "memsize", default_value = "1B")]
    mem_size: Size,
    /// Distance between translated addresses.
    #[clap(long = "step", default_value = "64GB")]
    step: Size,
    /// Translate virtual to physical addresses only.
    #[clap(long = "v2p", conflicts_with = "p2d")]
    v2p: bool,
    /// Translate physical to DRAM addresses only.
    #[clap(long = "p2d")]
    p2d: bool,
    /// Reuse the last pagemap entry for addresses in the same page.
    #[clap(long = "cache-pagemap")]
    cache_pagemap: bool,
    /// Cache PCI configuration register reads.
    #[clap(long = "cache-pci")]
    cache_pci: bool,
    /// Read registers from a JSON snapshot instead of sysfs.
    #[clap(long = "registers")]
    registers: Option<String>,
    /// Write all registers read to a JSON snapshot.
    #[clap(long = "dump-registers")]
    dump_registers: Option<String>,
    /// PCI vendor id (hex) of the address map function [default: 1022].
    #[clap(long = "vendor", value_parser = parse_id)]
    vendor: Option<u16>,
    /// PCI device id (hex) of the address map function [default: 1201].
    #[clap(long = "device", value_parser = parse_id)]
    device: Option<u16>,
    /// Print a JSON report instead of CSV.
    #[clap(long = "json")]
    json: bool,
    /// Add pagemap details to every row.
    #[clap(long = "verbose", short = 'v')]
    verbose: bool,
    /// Enable debug logging.
    #[clap(long = "debug", short = 'd')]
    debug: bool,
}

fn parse_id(s: &str) -> Result<u16, String> {
    let hex = s.trim().trim_start_matches("0x");
    u16::from_str_radix(hex, 16).map_err(|e| format!("invalid PCI id {:?}: {}", s, e))
}

impl CliArgs {
    fn mode(&self) -> OutputMode {
        if self.v2p {
            OutputMode::VirtToPhys
        } else if self.p2d {
            OutputMode::PhysToDram
        } else {
            OutputMode::VirtToDram
        }
    }
}

/// Loads the register snapshot or opens sysfs, and finds the nodes to scan.
fn open_registers(args: &CliArgs) -> Result<(Vec<PciDevice>, Registers)> {
    let cached = args.cache_pci || args.dump_registers.is_some();
    match &args.registers {
        Some(path) => {
            let snapshot = RegisterSnapshot::from_jsonfile(path)
                .with_context(|| format!("failed to load register snapshot {}", path))?;
            let nodes = snapshot.devices();
            info!(
                "Loaded {} registers of {} node(s) from {}",
                snapshot.len(),
                nodes.len(),
                path
            );
            Ok((nodes, Registers::new(Box::new(snapshot), cached)))
        }
        None => {
            let nodes = discover_nodes(
                args.vendor.unwrap_or(AMD_VENDOR_ID),
                args.device.unwrap_or(FAM10H_ADDRESS_MAP_DEVICE_ID),
            )?;
            Ok((nodes, Registers::new(Box::new(SysfsRegisters::new()), cached)))
        }
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let progress = init_logging_with_progress(args.debug)?;
    info!("CLI args: {:?}", args);

    let mode = args.mode();
    let range = AddressRange::new(args.addr, args.mem_size.bytes(), args.step.bytes())
        .context("invalid --step")?;

    let mut pagemap = match (mode.has_virtual(), args.pid) {
        (true, Some(pid)) => {
            let page_size = args.page_size.map(|s| s.bytes()).unwrap_or_else(os_page_size);
            Some(LinuxPageMap::for_process(pid, page_size)?.with_memo(args.cache_pagemap))
        }
        (true, None) => bail!("--pid is required to translate virtual addresses"),
        (false, _) => None,
    };

    let mut decoder = if mode.has_dram() {
        let (nodes, registers) = open_registers(&args)?;
        Some(DramDecoder::new(nodes, registers))
    } else {
        if args.registers.is_some() || args.dump_registers.is_some() {
            warn!("--v2p does not read any registers, ignoring register snapshot options");
        }
        None
    };

    let bar = if range.len() > 1 {
        progress.add(ProgressBar::new(range.len()))
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(ProgressStyle::named_bar("virtual2dram"));

    let mut report = Report::new(mode);
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if !args.json {
        writeln!(out, "{}", TranslationRecord::csv_header(mode, args.verbose))?;
    }

    let summary = walk_range(&range, pagemap.as_mut(), decoder.as_mut(), |record| {
        if args.json {
            report.push(record);
        } else {
            writeln!(out, "{}", record.csv_row(mode, args.verbose))?;
        }
        bar.inc(1);
        Ok(())
    })?;
    bar.finish_and_clear();

    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
        info!("Wrote a report of {} records", report.len());
    }
    out.flush()?;
    if summary.undecodable > 0 {
        warn!(
            "{} of {} addresses could not be decoded to DRAM addresses",
            summary.undecodable, summary.addresses
        );
    }

    if let Some(decoder) = decoder {
        let registers = decoder.into_registers();
        if args.cache_pci {
            if let Some(stats) = registers.stats() {
                info!(
                    "PCI read called {} times, hit {} times, hit rate {:.3}",
                    stats.reads,
                    stats.hits,
                    stats.hit_rate()
                );
            }
        }
        if let (Some(path), Some(snapshot)) = (&args.dump_registers, registers.snapshot()) {
            snapshot
                .to_jsonfile(path)
                .with_context(|| format!("failed to write register snapshot {}", path))?;
            info!("Wrote {} registers to {}", snapshot.len(), path);
        }
    }

    Ok(())
}
