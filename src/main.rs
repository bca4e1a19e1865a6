mod config;
mod error;

use std::fs::{self, File};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use emu::bus::{Bus, FlatMemory};
use emu::cpu::asap::Asap;
use emu::cpu::upd7725::Upd7725;
use emu::device::{Debugger, Device, Execute};
use emu::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, RecordingSink, TracingSink};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::{Args, CpuKind, MachineConfig};
use error::Error;

const KINDS: [DiagnosticKind; 4] = [
    DiagnosticKind::IllegalOpcode,
    DiagnosticKind::UnhandledRegisterAccess,
    DiagnosticKind::InvalidRegionSize,
    DiagnosticKind::Unimplemented,
];

/// Logs every diagnostic and keeps them for the summary.
#[derive(Clone, Default)]
struct SummarySink {
    recording: RecordingSink,
}

impl DiagnosticSink for SummarySink {
    fn report(&mut self, diagnostic: Diagnostic) {
        TracingSink.report(diagnostic.clone());
        self.recording.report(diagnostic);
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(path) = log_file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    let file = File::create(path).map_err(Error::io(path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn load_memory(config: &MachineConfig) -> Result<FlatMemory, Error> {
    let path = config.image.as_deref().ok_or(Error::MissingImage)?;
    let image = fs::read(path).map_err(Error::io(path))?;

    let mut memory = FlatMemory::new(config.memory_size);
    let fits = usize::try_from(config.load_address)
        .ok()
        .and_then(|start| start.checked_add(image.len()))
        .is_some_and(|end| end <= memory.len());
    if !fits {
        return Err(Error::ImageTooLarge {
            size: image.len(),
            address: config.load_address,
            memory: memory.len(),
        });
    }

    memory.load(config.load_address, &image);
    tracing::info!(
        "loaded {} bytes from {} at {:#X}",
        image.len(),
        path.display(),
        config.load_address
    );
    Ok(memory)
}

fn load_data_rom(config: &MachineConfig) -> Result<Vec<u16>, Error> {
    let Some(path) = config.data_rom.as_deref() else {
        return Ok(Vec::new());
    };
    let bytes = fs::read(path).map_err(Error::io(path))?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn print_disassembly<C: Debugger>(core: &C, memory: &mut FlatMemory, start: u32, count: usize) {
    let mut address = start;
    for _ in 0..count {
        let bytes = memory.read_long(address).to_le_bytes();
        let (text, len) = core.disassemble(address, &bytes);
        println!("{address:08X}  {text}");
        if len == 0 {
            break;
        }
        #[allow(clippy::cast_possible_truncation)]
        let len = len as u32;
        address = address.wrapping_add(len);
    }
}

fn run<C: Execute + Debugger>(
    core: &mut C,
    memory: &mut FlatMemory,
    config: &MachineConfig,
    disassemble: usize,
) -> u64 {
    core.start();
    core.reset();

    if disassemble > 0 {
        print_disassembly(core, memory, config.load_address, disassemble);
    }

    let slice = u64::try_from(config.slice).unwrap_or_default();
    let mut remaining = config.cycles;
    let mut consumed = 0_u64;
    while remaining > 0 {
        let budget = remaining.min(slice);
        #[allow(clippy::cast_possible_truncation)]
        let used = core.execute_run(memory, budget as i32);
        consumed += u64::try_from(used).unwrap_or_default();
        remaining -= budget;
    }

    for &register in C::REGISTERS {
        println!("{:>6}  {}", register.to_string(), core.export_string(register));
    }
    core.stop();
    consumed
}

fn try_main(args: &Args) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::default(),
    };
    config.apply(args);
    if config.slice <= 0 {
        return Err(Error::InvalidSlice(config.slice));
    }

    let mut memory = load_memory(&config)?;
    let sink = SummarySink::default();

    let consumed = match config.cpu {
        CpuKind::Asap => {
            let mut core = Asap::new(config.asap, Box::new(sink.clone()));
            run(&mut core, &mut memory, &config, args.disassemble)
        }
        CpuKind::Upd7725 => {
            let data_rom = load_data_rom(&config)?;
            let mut core = Upd7725::new(config.upd7725, data_rom, Box::new(sink.clone()));
            run(&mut core, &mut memory, &config, args.disassemble)
        }
    };

    tracing::info!("ran {consumed} of {} cycles", config.cycles);
    for kind in KINDS {
        println!("{kind:?}: {}", sink.recording.count(kind));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = match init_logging(args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cabinet: {e}");
            return ExitCode::FAILURE;
        }
    };

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("cabinet: {e}");
            ExitCode::FAILURE
        }
    }
}
