use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lapwatch_core::{LapEntry, TimerStore};

const SAMPLE_INTERVAL_MS: u64 = 10;

/// Commands a shell can issue against the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    Lap,
}

/// Read-only view of the store at one instant, pushed to subscribers
/// after every state change.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub main_display: String,
    pub is_running: bool,
    pub has_started: bool,
    pub laps: Vec<LapEntry>,
}

enum ServiceMsg {
    Command(Command),
    Tick,
    Subscribe(Sender<StoreSnapshot>),
    Shutdown,
}

enum PumpCtrl {
    Start(u64),
    Stop,
    Quit,
}

/// Cloneable handle for issuing commands to a running store service.
#[derive(Clone)]
pub struct StoreHandle {
    tx: Sender<ServiceMsg>,
}

impl StoreHandle {
    pub fn command(&self, command: Command) {
        self.tx.send(ServiceMsg::Command(command)).ok();
    }

    pub fn start(&self) {
        self.command(Command::Start);
    }

    pub fn stop(&self) {
        self.command(Command::Stop);
    }

    pub fn reset(&self) {
        self.command(Command::Reset);
    }

    pub fn lap(&self) {
        self.command(Command::Lap);
    }

    /// Register a snapshot listener. The current snapshot arrives
    /// immediately; after that, one arrives per state change.
    pub fn subscribe(&self) -> Receiver<StoreSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.tx.send(ServiceMsg::Subscribe(tx)).ok();
        rx
    }

    pub fn shutdown(&self) {
        self.tx.send(ServiceMsg::Shutdown).ok();
    }
}

struct StoreService {
    store: TimerStore,
    epoch: Instant,
    subscribers: Vec<Sender<StoreSnapshot>>,
    pump: Sender<PumpCtrl>,
    pump_running: bool,
}

impl StoreService {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            main_display: self.store.main_display(),
            is_running: self.store.is_running(),
            has_started: self.store.has_started(),
            laps: self.store.lap_view(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }

    fn start_pump(&mut self) {
        if !self.pump_running {
            self.pump_running = true;
            self.pump.send(PumpCtrl::Start(SAMPLE_INTERVAL_MS)).ok();
        }
    }

    fn stop_pump(&mut self) {
        if self.pump_running {
            self.pump_running = false;
            self.pump.send(PumpCtrl::Stop).ok();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => {
                let now = self.now_ms();
                self.store.start_timer(now);
                self.start_pump();
            }
            Command::Stop => {
                self.store.stop_timer();
                self.stop_pump();
            }
            Command::Reset => {
                self.store.reset_timer();
                self.stop_pump();
            }
            Command::Lap => {
                self.store.lap_timer();
            }
        }
        self.publish();
    }

    fn handle_tick(&mut self) {
        if !self.store.is_running() {
            // Tick raced a stop; nothing to sample
            self.stop_pump();
            return;
        }
        let now = self.now_ms();
        self.store.measure(now);
        self.publish();
    }

    fn run(&mut self, rx: Receiver<ServiceMsg>) {
        log::info!("store service up");
        loop {
            let msg = match rx.recv() {
                Ok(msg) => msg,
                Err(_) => break, // every handle is gone
            };
            match msg {
                ServiceMsg::Command(command) => self.handle_command(command),
                ServiceMsg::Tick => self.handle_tick(),
                ServiceMsg::Subscribe(subscriber) => {
                    subscriber.send(self.snapshot()).ok();
                    self.subscribers.push(subscriber);
                }
                ServiceMsg::Shutdown => break,
            }
        }
        self.pump.send(PumpCtrl::Quit).ok();
        log::info!("store service down");
    }
}

fn pump_thread(ctrl: Receiver<PumpCtrl>, service: Sender<ServiceMsg>) {
    let mut interval_ms = SAMPLE_INTERVAL_MS;
    let mut running = false;

    loop {
        if running {
            thread::sleep(Duration::from_millis(interval_ms));
            if service.send(ServiceMsg::Tick).is_err() {
                break;
            }
        }

        // Check for control messages (non-blocking when running, blocking when stopped)
        let msg = if running {
            match ctrl.try_recv() {
                Ok(msg) => Some(msg),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match ctrl.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            }
        };

        if let Some(msg) = msg {
            match msg {
                PumpCtrl::Start(ms) => {
                    interval_ms = if ms == 0 { SAMPLE_INTERVAL_MS } else { ms };
                    running = true;
                }
                PumpCtrl::Stop => {
                    running = false;
                }
                PumpCtrl::Quit => break,
            }
        }
    }
}

/// Spawn the store service and its sampling pump. Returns the command
/// handle and the service thread's join handle.
pub fn spawn() -> (StoreHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let (pump_tx, pump_rx) = mpsc::channel();

    let tick_tx = tx.clone();
    thread::spawn(move || pump_thread(pump_rx, tick_tx));

    let service = thread::spawn(move || {
        let mut service = StoreService {
            store: TimerStore::new(),
            epoch: Instant::now(),
            subscribers: Vec::new(),
            pump: pump_tx,
            pump_running: false,
        };
        service.run(rx);
    });

    (StoreHandle { tx }, service)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_for<F>(rx: &Receiver<StoreSnapshot>, predicate: F) -> StoreSnapshot
    where
        F: Fn(&StoreSnapshot) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .expect("timed out waiting for a matching snapshot");
            let snapshot = rx.recv_timeout(remaining).expect("service hung up");
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    }

    #[test]
    fn test_subscribe_receives_current_snapshot() {
        let (handle, service) = spawn();
        let snapshots = handle.subscribe();

        let first = snapshots.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!first.is_running);
        assert!(!first.has_started);
        assert_eq!(first.main_display, "0 : 00 : 00");
        assert!(first.laps.is_empty());

        handle.shutdown();
        service.join().unwrap();
    }

    #[test]
    fn test_commands_publish_state_changes() {
        let (handle, service) = spawn();
        let snapshots = handle.subscribe();

        handle.start();
        wait_for(&snapshots, |s| s.is_running);

        handle.lap();
        wait_for(&snapshots, |s| s.laps.len() == 1);

        handle.stop();
        let stopped = wait_for(&snapshots, |s| !s.is_running);
        assert_eq!(stopped.laps.len(), 1);
        assert_eq!(stopped.laps[0].label, "Lap 1");

        handle.reset();
        let reset = wait_for(&snapshots, |s| !s.has_started && s.laps.is_empty());
        assert_eq!(reset.main_display, "0 : 00 : 00");

        handle.shutdown();
        service.join().unwrap();
    }

    #[test]
    fn test_running_store_ticks_forward() {
        let (handle, service) = spawn();
        let snapshots = handle.subscribe();

        handle.start();
        // The pump has to move the display off zero shortly
        let moving = wait_for(&snapshots, |s| s.main_display != "0 : 00 : 00");
        assert!(moving.is_running);
        assert!(moving.has_started);

        handle.stop();
        let stopped = wait_for(&snapshots, |s| !s.is_running);
        assert!(stopped.has_started); // Total survives the stop

        handle.shutdown();
        service.join().unwrap();
    }

    #[test]
    fn test_late_subscriber_sees_current_state() {
        let (handle, service) = spawn();
        let early = handle.subscribe();

        handle.start();
        wait_for(&early, |s| s.is_running);
        handle.lap();
        handle.lap();
        wait_for(&early, |s| s.laps.len() == 2);

        // A subscriber arriving now gets the current state up front
        let late = handle.subscribe();
        let snapshot = wait_for(&late, |s| s.laps.len() == 2);
        assert_eq!(snapshot.laps[0].label, "Lap 2");
        assert_eq!(snapshot.laps[1].label, "Lap 1");

        handle.shutdown();
        service.join().unwrap();
    }
}
