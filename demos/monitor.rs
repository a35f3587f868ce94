//! Replays a captured heating-bus byte stream through the decoder and
//! prints the resulting telemetry snapshot.

use std::{fs::File, io::Read, process::exit};

use clap::{Arg, Command};
use heatbus::{chrono::Local, km_data, BusDecoder, Protocol, Result, StreamBuffer, SystemClock};

fn print_snapshot(decoder: &BusDecoder<StreamBuffer, SystemClock>) {
    let snapshot = decoder.snapshot();

    println!(
        "[{}] {} snapshot (bus {})",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        snapshot.protocol(),
        if snapshot.bus_ok() { "ok" } else { "faulty" }
    );

    for idx in 0..snapshot.temp_num() {
        println!("  temperature {:2}: {:7.1} °C", idx + 1, snapshot.temp(idx));
    }
    for idx in 0..snapshot.pump_num() {
        println!("  pump        {:2}: {:5} %", idx + 1, snapshot.pump(idx));
    }
    for idx in 0..snapshot.relay_num() {
        println!("  relay       {:2}: {}", idx + 1, if snapshot.relay(idx) { "on" } else { "off" });
    }

    if snapshot.protocol() == Protocol::Km {
        let km = snapshot.km();
        println!(
            "  burner: {}, main pump: {}, loop pump: {}, mode: {}",
            km.burner(),
            km.main_pump(),
            km.loop_pump(),
            km_data::mode_name(km.mode())
        );
    }

    if decoder.participant_count() > 0 {
        println!("  participants:");
        for p in decoder.registry().iter() {
            println!(
                "    0x{:04X} {:20} ({} temps, {} pumps, {} relays){}",
                p.address(),
                p.name(),
                p.temp_channels(),
                p.pump_channels(),
                p.relay_channels(),
                if p.is_auto_detected() { " [auto]" } else { "" }
            );
        }
    }
}

fn run() -> Result<()> {
    env_logger::init();

    let matches = Command::new("heatbus-monitor")
        .about("Replays captured heating-bus data")
        .arg(
            Arg::new("protocol")
                .help("Wire protocol: vbus, kw, p300, or km")
                .required(true)
                .value_name("PROTOCOL"),
        )
        .arg(
            Arg::new("input")
                .help("File containing the captured byte stream")
                .required(true)
                .value_name("FILE"),
        )
        .get_matches();

    let protocol: Protocol = matches.get_one::<String>("protocol").expect("required").parse()?;
    let filename = matches.get_one::<String>("input").expect("required");

    let mut bytes = Vec::new();
    File::open(filename)?.read_to_end(&mut bytes)?;

    let mut decoder = BusDecoder::new(StreamBuffer::new(), SystemClock::new(), protocol);
    decoder.source_mut().feed(&bytes);

    while !decoder.source().is_empty() {
        decoder.tick();
    }
    decoder.tick();
    decoder.tick();

    if decoder.is_ready() {
        print_snapshot(&decoder);
    } else {
        println!("No decodable frame in {:?}", filename);
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("ERROR: {}", err);
        exit(1);
    }
}
