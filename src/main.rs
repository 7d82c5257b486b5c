// Demo driver: composes a short two-track phrase through the command
// layer and writes it out as a standard MIDI file.

use std::fs;

use midiline::{Command, Session};

fn main() {
    env_logger::init();

    let mut session = Session::new("Midiline Demo", 480, 110.0, (4, 4), None);

    let batch = [
        Command::new("track").arg("add").arg("Piano"),
        Command::new("track").arg("add").arg("Bass"),
        Command::new("chord")
            .target("Piano")
            .arg("Cmaj")
            .param("at", "1.1")
            .param("dur", "half")
            .param("vel", "mf"),
        Command::new("chord")
            .target("Piano")
            .arg("Am")
            .param("at", "1.3")
            .param("dur", "half")
            .param("vel", "mf"),
        Command::new("chord")
            .target("Piano")
            .arg("Fmaj")
            .param("at", "2.1")
            .param("dur", "half")
            .param("vel", "f"),
        Command::new("chord")
            .target("Piano")
            .arg("G7")
            .param("at", "2.3")
            .param("dur", "half")
            .param("vel", "f"),
        Command::new("note")
            .target("Bass")
            .arg("C2")
            .param("at", "1.1")
            .param("dur", "quarter"),
        Command::new("note")
            .target("Bass")
            .arg("A1")
            .param("at", "1.3")
            .param("dur", "quarter"),
        Command::new("note")
            .target("Bass")
            .arg("F1")
            .param("at", "2.1")
            .param("dur", "quarter"),
        Command::new("note")
            .target("Bass")
            .arg("G1")
            .param("at", "2.3")
            .param("dur", "quarter"),
        Command::new("marker").arg("head").param("at", "1.1"),
    ];

    let response = session.apply_batch(&batch);
    println!("{}", response);

    if !response.ok {
        eprintln!("demo batch failed; not writing file");
        std::process::exit(1);
    }

    for query in ["tracks", "stats"] {
        println!("\n{}", session.query(&Command::new(query)).message);
    }

    match session.save() {
        Ok(bytes) => {
            let path = "demo.mid";
            if let Err(err) = fs::write(path, &bytes) {
                eprintln!("failed to write {}: {}", path, err);
                std::process::exit(1);
            }
            println!("\nWrote {} ({} bytes)", path, bytes.len());
        }
        Err(err) => {
            eprintln!("failed to serialise: {}", err);
            std::process::exit(1);
        }
    }
}
