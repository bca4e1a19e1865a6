//! Machine description: a TOML file, overridden by the command line.
//!
//! ```toml
//! cpu = "upd7725"
//! image = "dsp1.program"
//! data_rom = "dsp1.data"
//! cycles = 200000
//!
//! [upd7725]
//! variant = "upd7725"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use emu::cpu::asap::AsapConfig;
use emu::cpu::upd7725::Upd7725Config;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CpuKind {
    #[default]
    Asap,
    Upd7725,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub cpu: CpuKind,
    pub image: Option<PathBuf>,
    /// Coefficient ROM of the DSP, little-endian 16-bit words.
    pub data_rom: Option<PathBuf>,
    pub load_address: u32,
    pub memory_size: usize,
    pub cycles: u64,
    pub slice: i32,
    pub asap: AsapConfig,
    pub upd7725: Upd7725Config,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cpu: CpuKind::default(),
            image: None,
            data_rom: None,
            load_address: 0,
            memory_size: 0x10_0000,
            cycles: 1_000_000,
            slice: 10_000,
            asap: AsapConfig::default(),
            upd7725: Upd7725Config::default(),
        }
    }
}

impl MachineConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        toml::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command-line flags win over the file.
    pub fn apply(&mut self, args: &Args) {
        if let Some(image) = &args.image {
            self.image = Some(image.clone());
        }
        if let Some(data_rom) = &args.data_rom {
            self.data_rom = Some(data_rom.clone());
        }
        if let Some(cpu) = args.cpu {
            self.cpu = cpu;
        }
        if let Some(cycles) = args.cycles {
            self.cycles = cycles;
        }
        if let Some(slice) = args.slice {
            self.slice = slice;
        }
        if let Some(load_address) = args.load_address {
            self.load_address = load_address;
        }
    }
}

fn parse_number(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("{text}: {e}"))
}

/// Runs a raw program image on one of the cores and reports where it ended up.
#[derive(Debug, Parser)]
#[command(name = "cabinet", version)]
pub struct Args {
    /// Raw program image
    pub image: Option<PathBuf>,

    /// Machine description in TOML
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Core to run
    #[arg(long, value_enum)]
    pub cpu: Option<CpuKind>,

    /// Total cycle budget
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Cycles handed to the core per execute call
    #[arg(long)]
    pub slice: Option<i32>,

    /// Where the image is loaded, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_number)]
    pub load_address: Option<u32>,

    /// Data ROM for the DSP
    #[arg(long)]
    pub data_rom: Option<PathBuf>,

    /// Lists this many instructions from the load address before running
    #[arg(long, default_value_t = 0)]
    pub disassemble: usize,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu::cpu::upd7725::Variant;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_machine_file() {
        let config: MachineConfig = toml::from_str(
            r#"
            cpu = "upd7725"
            image = "dsp.bin"
            cycles = 5000

            [upd7725]
            variant = "upd96050"
            "#,
        )
        .unwrap();

        assert_eq!(config.cpu, CpuKind::Upd7725);
        assert_eq!(config.image, Some(PathBuf::from("dsp.bin")));
        assert_eq!(config.cycles, 5000);
        assert_eq!(config.slice, 10_000);
        assert_eq!(config.upd7725.variant, Variant::Upd96050);
        assert_eq!(config.asap, AsapConfig::default());
    }

    #[test]
    fn check_flags_override_file() {
        let mut config = MachineConfig {
            cpu: CpuKind::Upd7725,
            cycles: 5000,
            ..MachineConfig::default()
        };
        let args = Args::parse_from([
            "cabinet",
            "prog.bin",
            "--cpu",
            "asap",
            "--load-address",
            "0x400",
        ]);
        config.apply(&args);

        assert_eq!(config.cpu, CpuKind::Asap);
        assert_eq!(config.load_address, 0x400);
        assert_eq!(config.cycles, 5000);
        assert_eq!(config.image, Some(PathBuf::from("prog.bin")));
    }

    #[test]
    fn check_parse_number() {
        assert_eq!(parse_number("0x1F"), Ok(0x1F));
        assert_eq!(parse_number("42"), Ok(42));
        assert!(parse_number("0xZZ").is_err());
    }
}
