// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! rvcache-sim entry point
//!
//! Replays a trace of CPU memory operations against the modeled cache
//! subsystem and reports what each one returned plus the run statistics.
//! A character console is mapped at `0x2000_0000`, so traced stores there
//! print.

use std::env;
use std::path::{Path, PathBuf};

use rvcache::core::config::SimConfig;
use rvcache::core::cpu::MemWidth;
use rvcache::core::mem::Console;
use rvcache::core::system::MemorySystem;
use rvcache::core::trace::{self, TraceOp};

/// MMIO address of the character console the CLI wires up.
const CONSOLE_BASE: u32 = 0x2000_0000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <IMAGE> <TRACE> [CONFIG]", args[0]);
        eprintln!("Example: {} program.bin ops.trace run.toml", args[0]);
        std::process::exit(1);
    }

    let image_path = &args[1];
    let trace_path = &args[2];

    let mut config = match args.get(3) {
        Some(path) => SimConfig::load(Path::new(path))?,
        None => SimConfig::default(),
    };
    config.image = Some(PathBuf::from(image_path));

    log::info!("Image: {}", image_path);
    log::info!("Trace: {}", trace_path);

    let ops = trace::parse(&std::fs::read_to_string(trace_path)?)?;
    log::info!("Replaying {} operations", ops.len());

    let mut system = MemorySystem::with_config(&config)?;
    system.add_device(Box::new(Console::new(CONSOLE_BASE)));

    for op in ops {
        match op {
            TraceOp::Fetch { addr } => {
                let word = system.fetch(addr)?;
                println!("fetch 0x{:08X} -> 0x{:08X}", addr, word);
            }
            TraceOp::Load { addr } => {
                let word = system.load(addr)?;
                println!("lw    0x{:08X} -> 0x{:08X}", addr, word);
            }
            TraceOp::Store { addr, value, width } => {
                system.store(addr, value, width)?;
                println!("s{}    0x{:08X} <- 0x{:08X}", width_letter(width), addr, value);
            }
        }
    }

    println!("-----------------------------");
    println!("{}", system.stats());

    Ok(())
}

fn width_letter(width: MemWidth) -> char {
    match width {
        MemWidth::Byte => 'b',
        MemWidth::Half => 'h',
        MemWidth::Word => 'w',
    }
}
