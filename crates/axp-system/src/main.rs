//! Command-line harness: loads a flat binary image into a fresh `System`
//! and runs the boot CPU until it halts or the instruction budget runs
//! out. Takes the entry point directly rather than booting through
//! firmware, since no firmware stage is modeled here.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use axp_system::{BootImage, CpuHalt, RunOutcome, System, SystemConfig};

#[derive(Parser, Debug)]
#[command(name = "axp-system", about = "Run a flat Alpha AXP binary image to completion")]
struct Args {
    /// Path to the flat binary image, loaded at --load-addr.
    #[arg(long)]
    image: PathBuf,

    /// Guest RAM size in MiB.
    #[arg(long, default_value_t = 64)]
    ram: u64,

    /// Number of CPUs to register with the SMP coordinator. Only CPU 0
    /// is started.
    #[arg(long, default_value_t = 1)]
    cpus: u32,

    /// Physical address the image is loaded at.
    #[arg(long, default_value_t = 0, value_parser = parse_u64)]
    load_addr: u64,

    /// Virtual address CPU 0's PC starts at. Defaults to --load-addr.
    #[arg(long, value_parser = parse_u64)]
    entry: Option<u64>,

    /// Stop after this many retired instructions even if the guest never
    /// halts.
    #[arg(long, default_value_t = 10_000_000)]
    max_insts: u64,

    /// Instructions per round-robin time slice.
    #[arg(long, default_value_t = 4096)]
    slice_insts: u64,
}

fn parse_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init().ok();

    let args = Args::parse();
    let bytes = fs::read(&args.image).with_context(|| format!("reading image {}", args.image.display()))?;

    let config = SystemConfig { ram_bytes: args.ram * 1024 * 1024, cpu_count: args.cpus, ..SystemConfig::default() };
    let system = System::new(config).context("allocating guest RAM")?;

    let entry = args.entry.unwrap_or(args.load_addr);
    system
        .load_image(BootImage { bytes: &bytes, load_addr: args.load_addr, entry })
        .context("loading boot image into guest RAM")?;

    let outcome = system.run_boot_cpu(args.max_insts, args.slice_insts);
    report(&outcome);

    match outcome.halt {
        CpuHalt::Halted => Ok(()),
        CpuHalt::InstructionBudgetExhausted => {
            anyhow::bail!("instruction budget exhausted after {} instructions without halting", outcome.instructions_retired)
        }
        CpuHalt::NoForwardProgress => {
            anyhow::bail!("CPU {} made no retirement progress (fault loop, likely a missing page table)", outcome.cpu_id)
        }
    }
}

fn report(outcome: &RunOutcome) {
    tracing::info!(cpu = outcome.cpu_id, retired = outcome.instructions_retired, halt = ?outcome.halt, "run finished");
}
