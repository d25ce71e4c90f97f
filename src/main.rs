mod service;
mod ui;

use std::io;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use tracing_log::LogTracer;

use crate::service::{StoreHandle, StoreSnapshot};

/// How long a single wait for keyboard input may block the draw loop.
const INPUT_POLL_MS: u64 = 50;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about)]
struct Arguments {
    #[arg(short = 'v', long = None, action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn main() {
    let arguments = Arguments::parse();
    set_log_level(&arguments).expect("Failed to configure logging");

    tracing::debug!(?arguments, "starting lapwatch");

    if let Err(e) = run() {
        tracing::error!(%e, "Unable to run the stopwatch");
    }
}

fn set_log_level(arguments: &Arguments) -> anyhow::Result<()> {
    LogTracer::init()?;

    let level = match arguments.verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let guard = TerminalGuard::enable()?;

    let (handle, service) = service::spawn();
    let updates = handle.subscribe();
    // The subscription answers with the current snapshot right away.
    let latest = updates.recv_timeout(Duration::from_secs(1))?;

    let result = shell_loop(&handle, &updates, latest);

    // Terminal back to normal before anything else gets to print.
    drop(guard);

    handle.shutdown();
    service.join().ok();

    result
}

fn shell_loop(
    handle: &StoreHandle,
    updates: &Receiver<StoreSnapshot>,
    mut latest: StoreSnapshot,
) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    ui::draw(&mut stdout, &latest)?;

    loop {
        if !handle_key_event(handle, &latest)? {
            return Ok(());
        }

        // Drain every pending snapshot, then repaint once.
        let mut dirty = false;
        while let Ok(snapshot) = updates.try_recv() {
            latest = snapshot;
            dirty = true;
        }
        if dirty {
            ui::draw(&mut stdout, &latest)?;
        }
    }
}

/// Maps key presses onto store commands. Returns false once the user quits.
fn handle_key_event(handle: &StoreHandle, latest: &StoreSnapshot) -> anyhow::Result<bool> {
    if event::poll(Duration::from_millis(INPUT_POLL_MS))? {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                return Ok(true);
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if latest.is_running {
                        handle.stop();
                    } else {
                        handle.start();
                    }
                }
                KeyCode::Char('l') if latest.is_running => handle.lap(),
                KeyCode::Char('r') if !latest.is_running => handle.reset(),
                _ => {}
            }
        }
    }

    Ok(true)
}

/// Raw mode plus the alternate screen; dropping the guard restores both,
/// whichever way the shell exits.
struct TerminalGuard;

impl TerminalGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        // Live from here, so a failed screen switch still restores raw mode
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}
