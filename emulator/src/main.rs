mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::Session;

const DEFAULT_EPOCH_LENGTH_MS: u64 = 10_000;
const DEFAULT_ADVERTISE_INTERVAL_UNITS: u16 = 800;

fn main() -> io::Result<()> {
    env_logger::init();

    let (epoch_length_ms, advertise_interval_units) = parse_config().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: emulator [--epoch <ms>] [--interval <625us-units>]");
        process::exit(2);
    });

    let mut session =
        Session::new(epoch_length_ms, advertise_interval_units).unwrap_or_else(|err| {
            eprintln!("Configuration error: {err}");
            process::exit(2);
        });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Discovery duty-cycle emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_config() -> Result<(u64, u16), String> {
    let mut epoch_length_ms = DEFAULT_EPOCH_LENGTH_MS;
    let mut advertise_interval_units = DEFAULT_ADVERTISE_INTERVAL_UNITS;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--epoch" => {
                let value = args.next().ok_or("Expected value after --epoch")?;
                epoch_length_ms = value
                    .parse()
                    .map_err(|_| format!("`{value}` is not a duration in ms"))?;
            }
            "--interval" => {
                let value = args.next().ok_or("Expected value after --interval")?;
                advertise_interval_units = value
                    .parse()
                    .map_err(|_| format!("`{value}` is not an interval in 625us units"))?;
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok((epoch_length_ms, advertise_interval_units))
}
