use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};

use crate::service::StoreSnapshot;

// Rows used by the header block before the lap list starts
const HEADER_ROWS: u16 = 6;

pub fn draw(out: &mut impl Write, snapshot: &StoreSnapshot) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    queue!(out, Print("STOPWATCH\r\n\r\n"))?;
    queue!(out, Print(format!("  {}\r\n\r\n", snapshot.main_display)))?;
    queue!(out, Print(format!("  {}\r\n\r\n", action_hints(snapshot))))?;

    // Lap list arrives most recent first; clip it to the screen
    let (_cols, rows) = terminal::size().unwrap_or((80, 24));
    let max_visible = rows.saturating_sub(HEADER_ROWS + 1) as usize;
    for entry in snapshot.laps.iter().take(max_visible) {
        queue!(
            out,
            Print(format!("  {:<8} {}\r\n", entry.label, entry.timer.display()))
        )?;
    }

    out.flush()
}

/// The commands offered for the current state: lap+stop while running,
/// start (plus reset once anything is on the clock) while stopped.
fn action_hints(snapshot: &StoreSnapshot) -> &'static str {
    if snapshot.is_running {
        "l=lap  SPACE=stop  q=quit"
    } else if snapshot.has_started {
        "r=reset  SPACE=start  q=quit"
    } else {
        "SPACE=start  q=quit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lapwatch_core::{LapEntry, Timer};

    fn snap(is_running: bool, has_started: bool, laps: Vec<LapEntry>) -> StoreSnapshot {
        StoreSnapshot {
            main_display: "0 : 00 : 00".to_string(),
            is_running,
            has_started,
            laps,
        }
    }

    #[test]
    fn test_draw_renders_display_and_laps() {
        let laps = vec![
            LapEntry {
                label: "Lap 2".to_string(),
                timer: Timer::with_elapsed(700),
            },
            LapEntry {
                label: "Lap 1".to_string(),
                timer: Timer::with_elapsed(800),
            },
        ];
        let mut snapshot = snap(true, true, laps);
        snapshot.main_display = "0 : 01 : 50".to_string();

        let mut out = Vec::new();
        draw(&mut out, &snapshot).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("0 : 01 : 50"));
        assert!(text.contains("l=lap"));
        assert!(text.contains("0 : 00 : 70"));
        // Rows keep the snapshot's most-recent-first order
        let lap2 = text.find("Lap 2").unwrap();
        let lap1 = text.find("Lap 1").unwrap();
        assert!(lap2 < lap1);
    }

    #[test]
    fn test_action_hints_follow_state() {
        assert_eq!(action_hints(&snap(false, false, Vec::new())), "SPACE=start  q=quit");
        assert_eq!(
            action_hints(&snap(false, true, Vec::new())),
            "r=reset  SPACE=start  q=quit"
        );
        assert_eq!(
            action_hints(&snap(true, true, Vec::new())),
            "l=lap  SPACE=stop  q=quit"
        );
    }

    #[test]
    fn test_draw_reports_writer_errors() {
        struct FailingWriter;

        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
            }
        }

        // An io failure must surface to the caller, not vanish mid-draw
        let snapshot = snap(false, false, Vec::new());
        assert!(draw(&mut FailingWriter, &snapshot).is_err());
    }
}
