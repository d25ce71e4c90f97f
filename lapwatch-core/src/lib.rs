//! Pure stopwatch state with no platform dependencies.
//! Every timed operation takes `now_ms`, so tests drive the clock directly.

use uuid::Uuid;

/// A single stopwatch value: the currently accumulating segment plus the
/// time saved from earlier segments.
#[derive(Clone, Debug)]
pub struct Timer {
    id: Uuid,
    elapsed_ms: u64,
    saved_ms: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_elapsed(0)
    }

    pub fn with_elapsed(initial_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            elapsed_ms: initial_ms,
            saved_ms: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn saved_ms(&self) -> u64 {
        self.saved_ms
    }

    pub fn set_elapsed_ms(&mut self, ms: u64) {
        self.elapsed_ms = ms;
    }

    /// Fold the running segment into the saved total. `total_ms` is
    /// unchanged - only the split between the two fields moves.
    pub fn save_time(&mut self) {
        self.saved_ms += self.elapsed_ms;
        self.elapsed_ms = 0;
    }

    pub fn reset(&mut self) {
        self.elapsed_ms = 0;
        self.saved_ms = 0;
    }

    pub fn total_ms(&self) -> u64 {
        self.elapsed_ms + self.saved_ms
    }

    pub fn display(&self) -> String {
        format_m_ss_cc(self.total_ms())
    }
}

/// One row of the lap list: the chronological label plus the timer holding
/// that lap's split.
#[derive(Clone, Debug)]
pub struct LapEntry {
    pub label: String,
    pub timer: Timer,
}

/// Stopped/Running state machine owning the main timer and the lap list.
/// Every command is total: no call can fail from any state.
pub struct TimerStore {
    is_running: bool,
    current: Timer,
    started_at_ms: Option<u64>,
    laps: Vec<Timer>,
}

impl TimerStore {
    pub fn new() -> Self {
        Self {
            is_running: false,
            current: Timer::new(),
            started_at_ms: None,
            laps: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn current(&self) -> &Timer {
        &self.current
    }

    pub fn laps(&self) -> &[Timer] {
        &self.laps
    }

    pub fn start_timer(&mut self, now_ms: u64) {
        if self.is_running {
            return;
        }
        self.is_running = true;
        self.started_at_ms = Some(now_ms);
    }

    pub fn stop_timer(&mut self) {
        if !self.is_running {
            return;
        }
        self.current.save_time();
        self.is_running = false;
        self.started_at_ms = None;
    }

    pub fn reset_timer(&mut self) {
        self.current.reset();
        self.laps.clear();
        self.is_running = false;
        self.started_at_ms = None;
    }

    /// Record a lap holding the time since the previous lap (or since the
    /// start, for the first one). Splits, not cumulative totals.
    pub fn lap_timer(&mut self) {
        let split = self.current.total_ms().saturating_sub(self.lap_total());
        self.laps.push(Timer::with_elapsed(split));
    }

    /// One sampling tick: refresh the running segment from the clock.
    /// A tick that lands after the store stopped is a no-op.
    pub fn measure(&mut self, now_ms: u64) {
        if !self.is_running {
            return;
        }
        if let Some(started_at) = self.started_at_ms {
            self.current.set_elapsed_ms(now_ms.saturating_sub(started_at));
        }
    }

    pub fn main_display(&self) -> String {
        self.current.display()
    }

    pub fn has_started(&self) -> bool {
        self.current.total_ms() != 0
    }

    pub fn lap_total(&self) -> u64 {
        self.laps.iter().map(Timer::total_ms).sum()
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    /// Lap rows labelled in insertion order ("Lap 1" is the oldest), then
    /// reversed so the most recent lap comes first.
    pub fn lap_view(&self) -> Vec<LapEntry> {
        let mut view: Vec<LapEntry> = self
            .laps
            .iter()
            .enumerate()
            .map(|(i, lap)| LapEntry {
                label: format!("Lap {}", i + 1),
                timer: lap.clone(),
            })
            .collect();
        view.reverse();
        view
    }
}

/// Format milliseconds as "M : SS : CC" (minutes unbounded, seconds,
/// centiseconds). Centiseconds truncate, they never round.
pub fn format_m_ss_cc(ms: u64) -> String {
    let total_cs = ms / 10;
    let total_secs = total_cs / 100;
    format!(
        "{} : {:02} : {:02}",
        total_secs / 60,
        total_secs % 60,
        total_cs % 100
    )
}
