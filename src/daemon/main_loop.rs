//! Daemon main loop and initialization

use anyhow::{Result, bail};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

use super::dispatcher::{Dispatcher, EventHandler};
use super::signals;
use crate::constants::{control, daemon};
use crate::control::channel::ControlChannel;
use crate::control::command;
use crate::input::registry::DeviceRegistry;
use crate::triggers::{ShellLauncher, TriggerEngine};

/// Startup settings, straight from the command line
#[derive(Debug, Default)]
pub struct DaemonOptions {
    pub devices: Vec<PathBuf>,
    pub command_path: Option<PathBuf>,
    pub trigger_files: Vec<PathBuf>,
    pub dump: bool,
}

/// Descriptors reported ready by one readiness wait
struct ReadySet {
    /// Indexed like the registry at the time of the wait
    devices: Vec<bool>,
    control: bool,
}

/// All daemon state: the watched devices, the control channel and the event consumers
pub struct Daemon<H> {
    registry: DeviceRegistry,
    channel: ControlChannel,
    dispatcher: Dispatcher<H>,
    shutdown: Arc<AtomicBool>,
    poll_timeout_ms: u16,
}

impl<H: EventHandler> Daemon<H> {
    pub fn new(registry: DeviceRegistry, channel: ControlChannel, dispatcher: Dispatcher<H>) -> Self {
        Self {
            registry,
            channel,
            dispatcher,
            shutdown: Arc::new(AtomicBool::new(false)),
            poll_timeout_ms: daemon::POLL_TIMEOUT_MS,
        }
    }

    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The loop keeps going while there is anything left to watch
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && (self.registry.count() > 0 || self.channel.readable())
    }

    pub fn run(&mut self) {
        info!(
            devices = ?self.registry.paths().collect::<Vec<_>>(),
            command_channel = self.channel.readable(),
            "Entering event loop"
        );

        while self.is_running() {
            self.poll_once();
        }

        if self.shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, closing devices");
        } else {
            info!("No devices or command channel left, exiting");
        }
    }

    /// One loop iteration: wait, drain ready devices in registry order, then
    /// the control channel. Commands take effect from the next iteration.
    fn poll_once(&mut self) {
        let ready = match self.wait_for_readiness() {
            Ok(Some(ready)) => ready,
            Ok(None) => return,
            Err(Errno::EINTR) => {
                debug!("Readiness wait interrupted by signal");
                return;
            }
            Err(e) => {
                error!(error = %e, "poll() failed");
                return;
            }
        };

        let dispatcher = &mut self.dispatcher;
        self.registry.for_each_ready(&ready.devices, |device| {
            let record = device.read_event()?;
            dispatcher.dispatch(device.path(), &record);
            Ok(())
        });

        if ready.control {
            for line in self.channel.consume() {
                command::interpret(&line, &mut self.registry);
            }
        }
    }

    /// Block until a device or the channel is readable. `None` on timeout.
    fn wait_for_readiness(&self) -> nix::Result<Option<ReadySet>> {
        let mut fds: Vec<PollFd<'_>> = self
            .registry
            .fds()
            .map(|fd| PollFd::new(fd, PollFlags::POLLIN))
            .collect();
        let device_count = fds.len();
        if let Some(fd) = self.channel.fd() {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }

        if poll(&mut fds, self.poll_timeout_ms)? == 0 {
            return Ok(None);
        }

        // hang-ups and errors count as readable: the following read reports them
        let readable =
            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
        let mut ready = fds
            .iter()
            .map(|fd| fd.revents().is_some_and(|revents| revents.intersects(readable)));
        let devices = ready.by_ref().take(device_count).collect();
        let control = ready.next().unwrap_or(false);

        Ok(Some(ReadySet { devices, control }))
    }
}

/// Set everything up in order (control channel, signals, triggers, devices)
/// and run until nothing is left to watch or a shutdown signal arrives
pub fn run_daemon(options: DaemonOptions) -> Result<()> {
    if options.devices.is_empty() && options.command_path.is_none() {
        bail!("No input device files or command pipe specified");
    }

    let mut channel = ControlChannel::new(control::BUFFER_CAPACITY);
    if let Some(path) = &options.command_path {
        channel.configure(path.clone());
        channel.open()?;
    }
    if let Some(path) = channel.path() {
        info!(path = %path.display(), "Reading commands from channel");
    }

    signals::ignore_child_exits()?;
    let shutdown = signals::shutdown_flag()?;

    let mut engine = TriggerEngine::new(ShellLauncher);
    for path in &options.trigger_files {
        if let Err(e) = engine.load_trigger_file(path) {
            error!(error = %format!("{:#}", e), "Failed to load trigger file");
        }
    }
    info!(count = engine.trigger_count(), "Triggers active");

    let mut registry = DeviceRegistry::new();
    for path in &options.devices {
        registry.add(path);
    }

    let mut dispatcher = Dispatcher::new(engine);
    if options.dump {
        dispatcher = dispatcher.with_dump(Box::new(std::io::stdout()));
    }

    Daemon::new(registry, channel, dispatcher)
        .with_shutdown_flag(shutdown)
        .run();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::input;
    use crate::daemon::dispatcher::testing::{Call, RecordingHandler, SharedOutput};
    use crate::input::event::{EventClass, KeyEvent, encode};
    use nix::sys::pthread::{pthread_kill, pthread_self};
    use nix::sys::signal::Signal;
    use signal_hook::consts::SIGUSR1;
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    const TEST_TIMEOUT_MS: u16 = 200;

    fn device_file(records: &[(u16, u16, i32)]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for &(event_type, code, value) in records {
            file.write_all(&encode(event_type, code, value)).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn path_of(file: &NamedTempFile) -> PathBuf {
        file.path().to_path_buf()
    }

    /// A channel on a FIFO nobody has opened for writing: never readable
    fn idle_fifo_channel(dir: &tempfile::TempDir) -> ControlChannel {
        let fifo = dir.path().join("commands");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();
        let mut channel = ControlChannel::new(1024);
        channel.configure(&fifo);
        channel.open().unwrap();
        channel
    }

    fn daemon_with(
        registry: DeviceRegistry,
        channel: ControlChannel,
        handler: &RecordingHandler,
    ) -> Daemon<RecordingHandler> {
        let mut daemon = Daemon::new(registry, channel, Dispatcher::new(handler.clone()));
        daemon.poll_timeout_ms = TEST_TIMEOUT_MS;
        daemon
    }

    #[test]
    fn test_loop_never_runs_without_inputs() {
        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(DeviceRegistry::new(), ControlChannel::new(1024), &handler);

        assert!(!daemon.is_running());
        daemon.run();
        assert!(handler.calls.borrow().is_empty());
    }

    #[test]
    fn test_key_press_reaches_keystate_then_triggers() {
        let event0 = device_file(&[(input::EV_KEY, 30, 1)]);
        let mut registry = DeviceRegistry::new();
        registry.add(&path_of(&event0));

        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(registry, ControlChannel::new(1024), &handler);
        daemon.run();

        let press = KeyEvent::new(EventClass::Key, 30, 1);
        assert_eq!(
            *handler.calls.borrow(),
            vec![Call::UpdateKeystate(press), Call::DispatchTriggers(press)]
        );
        // end of file reads short: the device was dropped and the loop ended
        assert_eq!(daemon.registry.count(), 0);
    }

    #[test]
    fn test_only_key_and_switch_events_are_forwarded() {
        let device = device_file(&[
            (0x00, 0, 0),          // EV_SYN
            (0x02, 0x08, -1),      // EV_REL wheel
            (input::EV_KEY, 30, 1),
            (0x04, 4, 458756),     // EV_MSC scancode
            (input::EV_SW, 0, 1),
        ]);
        let path = path_of(&device);
        let mut registry = DeviceRegistry::new();
        registry.add(&path);

        let handler = RecordingHandler::default();
        let output = SharedOutput::default();
        let dispatcher = Dispatcher::new(handler.clone()).with_dump(Box::new(output.clone()));
        let mut daemon = Daemon::new(registry, ControlChannel::new(1024), dispatcher);
        daemon.poll_timeout_ms = TEST_TIMEOUT_MS;
        daemon.run();

        let key = KeyEvent::new(EventClass::Key, 30, 1);
        let switch = KeyEvent::new(EventClass::Switch, 0, 1);
        assert_eq!(
            *handler.calls.borrow(),
            vec![
                Call::UpdateKeystate(key),
                Call::DispatchTriggers(key),
                Call::UpdateKeystate(switch),
                Call::DispatchTriggers(switch),
            ]
        );

        let dumped = output.contents();
        let event_lines: Vec<_> = dumped.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            event_lines,
            vec![
                format!("EV_KEY\tKEY_A\t1\t{}", path.display()),
                format!("EV_SW\tSW_LID\t1\t{}", path.display()),
            ]
        );
    }

    #[test]
    fn test_one_record_per_device_per_iteration() {
        let first = device_file(&[(input::EV_KEY, 30, 1), (input::EV_KEY, 30, 0)]);
        let second = device_file(&[(input::EV_KEY, 48, 1)]);
        let mut registry = DeviceRegistry::new();
        registry.add(&path_of(&first));
        registry.add(&path_of(&second));

        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(registry, ControlChannel::new(1024), &handler);
        daemon.poll_once();

        // registry order: first device, then second
        let dispatched: Vec<_> = handler
            .calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::DispatchTriggers(event) => Some((event.code, event.value)),
                _ => None,
            })
            .collect();
        assert_eq!(dispatched, vec![(30, 1), (48, 1)]);
    }

    #[test]
    fn test_short_read_removes_device() {
        let mut broken = NamedTempFile::new().unwrap();
        broken.write_all(&[0u8; 5]).unwrap();
        broken.flush().unwrap();
        let healthy = device_file(&[(input::EV_KEY, 30, 1)]);

        let mut registry = DeviceRegistry::new();
        registry.add(&path_of(&broken));
        registry.add(&path_of(&healthy));

        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(registry, ControlChannel::new(1024), &handler);
        daemon.poll_once();

        // the failing device is gone, the one after it was still drained
        let healthy_path = path_of(&healthy);
        assert_eq!(
            daemon.registry.paths().collect::<Vec<_>>(),
            vec![healthy_path.as_path()]
        );
        assert_eq!(handler.calls.borrow().len(), 2);
    }

    #[test]
    fn test_control_commands_apply_from_next_iteration() {
        let event0 = device_file(&[(input::EV_KEY, 30, 1)]);
        let mut commands = NamedTempFile::new().unwrap();
        writeln!(commands, "ADD {}", event0.path().display()).unwrap();
        commands.flush().unwrap();

        let mut channel = ControlChannel::new(1024);
        channel.configure(commands.path());
        channel.open().unwrap();

        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(DeviceRegistry::new(), channel, &handler);
        assert!(daemon.is_running());

        daemon.poll_once();
        assert_eq!(daemon.registry.count(), 1);
        assert!(handler.calls.borrow().is_empty());

        daemon.poll_once();
        assert_eq!(handler.calls.borrow().len(), 2);
    }

    #[test]
    fn test_remove_command() {
        let event0 = device_file(&[(input::EV_KEY, 30, 1)]);
        let mut registry = DeviceRegistry::new();
        registry.add(&path_of(&event0));

        let mut commands = NamedTempFile::new().unwrap();
        writeln!(commands, "REMOVE {}", event0.path().display()).unwrap();
        commands.flush().unwrap();
        let mut channel = ControlChannel::new(1024);
        channel.configure(commands.path());
        channel.open().unwrap();

        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(registry, channel, &handler);

        // devices are drained before the channel is read
        daemon.poll_once();
        assert_eq!(handler.calls.borrow().len(), 2);
        assert_eq!(daemon.registry.count(), 0);
    }

    #[test]
    fn test_timeout_leaves_loop_running() {
        let dir = tempfile::tempdir().unwrap();
        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(DeviceRegistry::new(), idle_fifo_channel(&dir), &handler);

        let started = Instant::now();
        daemon.poll_once();

        assert!(started.elapsed() >= Duration::from_millis(u64::from(TEST_TIMEOUT_MS) / 2));
        assert!(handler.calls.borrow().is_empty());
        assert!(daemon.is_running());
        assert_eq!(daemon.channel.pending(), 0);
    }

    #[test]
    fn test_interrupted_wait_leaves_loop_running() {
        let dir = tempfile::tempdir().unwrap();
        let handler = RecordingHandler::default();
        let mut daemon = daemon_with(DeviceRegistry::new(), idle_fifo_channel(&dir), &handler);
        daemon.poll_timeout_ms = 5000;

        let interrupted = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGUSR1, Arc::clone(&interrupted)).unwrap();
        let waiting_thread = pthread_self();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            pthread_kill(waiting_thread, Signal::SIGUSR1).unwrap();
        });

        let started = Instant::now();
        daemon.poll_once();
        sender.join().unwrap();

        // the signal cut the wait short and changed nothing
        assert!(interrupted.load(Ordering::Relaxed));
        assert!(started.elapsed() < Duration::from_millis(5000));
        assert!(handler.calls.borrow().is_empty());
        assert!(daemon.is_running());

        let event0 = device_file(&[(input::EV_KEY, 30, 1)]);
        daemon.registry.add(event0.path());
        daemon.poll_timeout_ms = TEST_TIMEOUT_MS;
        daemon.poll_once();
        assert_eq!(handler.calls.borrow().len(), 2);
    }

    #[test]
    fn test_shutdown_flag_stops_loop() {
        let event0 = device_file(&[(input::EV_KEY, 30, 1)]);
        let mut registry = DeviceRegistry::new();
        registry.add(&path_of(&event0));

        let handler = RecordingHandler::default();
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut daemon = daemon_with(registry, ControlChannel::new(1024), &handler)
            .with_shutdown_flag(Arc::clone(&shutdown));

        assert!(!daemon.is_running());
        daemon.run();
        assert!(handler.calls.borrow().is_empty());
        assert_eq!(daemon.registry.count(), 1);
    }

    #[test]
    fn test_run_daemon_requires_an_input() {
        let err = run_daemon(DaemonOptions::default()).unwrap_err();
        assert!(err.to_string().contains("No input device files or command pipe"));
    }

    #[test]
    fn test_run_daemon_fails_when_channel_cannot_open() {
        let options = DaemonOptions {
            command_path: Some(PathBuf::from("/nonexistent/keytrigd.fifo")),
            ..Default::default()
        };
        assert!(run_daemon(options).is_err());
    }
}
