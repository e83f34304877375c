//! FIFO client for the clipsim daemon.
//!
//! One command per call. The command pipe is opened non-blocking so a missing
//! daemon is reported instead of hanging; the id and content pipes block until
//! the daemon picks them up.

use std::error::Error as _;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use clipsim_protocol::{encode_id, parse_save_result, Command, FifoPaths, ProtocolError};
use fs_err::os::unix::fs::OpenOptionsExt;
use fs_err::{File, OpenOptions};

/// How long to wait for the daemon to reopen its end of the command pipe.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const CONNECT_RETRY: Duration = Duration::from_millis(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("clipsim daemon is not running (no reader on {0})")]
    NotRunning(String),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

fn io_error(context: &'static str) -> impl FnOnce(io::Error) -> ClientError {
    move |source| ClientError::Io { context, source }
}

/// `fs_err` keeps the OS error as the source of the path-carrying wrapper.
fn raw_os_error(err: &io::Error) -> Option<i32> {
    err.raw_os_error().or_else(|| {
        err.get_ref()
            .and_then(|inner| inner.source())
            .and_then(|source| source.downcast_ref::<io::Error>())
            .and_then(io::Error::raw_os_error)
    })
}

pub struct Client {
    paths: FifoPaths,
}

impl Client {
    pub fn new(paths: FifoPaths) -> Self {
        Self { paths }
    }

    pub fn print(&self) -> Result<Vec<u8>, ClientError> {
        self.send(Command::Print)?;
        self.receive()
    }

    pub fn info(&self, id: i32) -> Result<Vec<u8>, ClientError> {
        self.send(Command::Info)?;
        self.send_id(id)?;
        self.receive()
    }

    pub fn copy(&self, id: i32) -> Result<(), ClientError> {
        self.send(Command::Copy)?;
        self.send_id(id)
    }

    pub fn remove(&self, id: i32) -> Result<(), ClientError> {
        self.send(Command::Remove)?;
        self.send_id(id)
    }

    pub fn save(&self) -> Result<bool, ClientError> {
        self.send(Command::Save)?;
        let response = self.receive()?;
        Ok(parse_save_result(&response)?)
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        let mut fifo = self.open_command()?;
        fifo.write_all(&[command.as_byte()])
            .map_err(io_error("write command fifo"))?;
        tracing::debug!(command = ?command, "Sent command");
        Ok(())
    }

    /// The daemon closes and reopens its reader between commands, so a
    /// missing reader is retried briefly before giving up.
    fn open_command(&self) -> Result<File, ClientError> {
        let path = self.paths.command();
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            match OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(&path)
            {
                Ok(file) => return Ok(file),
                Err(err) if raw_os_error(&err) == Some(libc::ENXIO) => {
                    if Instant::now() >= deadline {
                        return Err(ClientError::NotRunning(path.display().to_string()));
                    }
                    thread::sleep(CONNECT_RETRY);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(ClientError::NotRunning(path.display().to_string()));
                }
                Err(source) => {
                    return Err(ClientError::Io {
                        context: "open command fifo",
                        source,
                    })
                }
            }
        }
    }

    fn send_id(&self, id: i32) -> Result<(), ClientError> {
        let mut fifo = OpenOptions::new()
            .write(true)
            .open(self.paths.passid())
            .map_err(io_error("open id fifo"))?;
        fifo.write_all(&encode_id(id))
            .map_err(io_error("write id fifo"))
    }

    fn receive(&self) -> Result<Vec<u8>, ClientError> {
        let mut bytes = Vec::new();
        File::open(self.paths.content())
            .map_err(io_error("open content fifo"))?
            .read_to_end(&mut bytes)
            .map_err(io_error("read content fifo"))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipsim_protocol::{decode_id, save_result, FIFO_DIR_ENV, ID_BYTES};
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::thread::JoinHandle;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    struct EnvGuard {
        key: &'static str,
        prior: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prior = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, prior }
        }

        fn unset(key: &'static str) -> Self {
            let prior = std::env::var(key).ok();
            std::env::remove_var(key);
            Self { key, prior }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.prior {
                std::env::set_var(self.key, value);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fake daemon: answers one command with `response`, reporting what it saw.
    fn fake_daemon(
        paths: &FifoPaths,
        response: Option<Vec<u8>>,
    ) -> JoinHandle<(u8, Option<i32>)> {
        let paths = paths.clone();
        thread::spawn(move || {
            let mut byte = [0u8; 1];
            File::open(paths.command())
                .unwrap()
                .read_exact(&mut byte)
                .unwrap();
            let command = Command::try_from(byte[0]).unwrap();

            let id = command.takes_id().then(|| {
                let mut raw = [0u8; ID_BYTES];
                File::open(paths.passid())
                    .unwrap()
                    .read_exact(&mut raw)
                    .unwrap();
                decode_id(&raw).unwrap()
            });

            if let Some(response) = response {
                OpenOptions::new()
                    .write(true)
                    .open(paths.content())
                    .unwrap()
                    .write_all(&response)
                    .unwrap();
            }
            (byte[0], id)
        })
    }

    fn setup() -> (tempfile::TempDir, FifoPaths) {
        let temp = tempfile::tempdir().unwrap();
        let paths = FifoPaths::with_dir(temp.path().join("clipsim"));
        clipsim_daemon::fifo::prepare(&paths).unwrap();
        (temp, paths)
    }

    #[test]
    fn print_reads_until_eof() {
        let (_temp, paths) = setup();
        let daemon = fake_daemon(&paths, Some(b"001 two\0000 one\0".to_vec()));

        let listing = Client::new(paths).print().unwrap();
        assert_eq!(listing, b"001 two\0000 one\0".to_vec());
        assert_eq!(daemon.join().unwrap(), (b'p', None));
    }

    #[test]
    fn copy_sends_id_after_command() {
        let (_temp, paths) = setup();
        let daemon = fake_daemon(&paths, None);

        Client::new(paths).copy(-3).unwrap();
        assert_eq!(daemon.join().unwrap(), (b'c', Some(-3)));
    }

    #[test]
    fn remove_uses_exclude_byte() {
        let (_temp, paths) = setup();
        let daemon = fake_daemon(&paths, None);

        Client::new(paths).remove(4).unwrap();
        assert_eq!(daemon.join().unwrap(), (b'x', Some(4)));
    }

    #[test]
    fn info_returns_raw_response() {
        let (_temp, paths) = setup();
        let daemon = fake_daemon(&paths, Some(b"Length: 2\nhi".to_vec()));

        let response = Client::new(paths).info(0).unwrap();
        assert_eq!(response, b"Length: 2\nhi".to_vec());
        assert_eq!(daemon.join().unwrap(), (b'i', Some(0)));
    }

    #[test]
    fn save_decodes_result_byte() {
        let (_temp, paths) = setup();
        let daemon = fake_daemon(&paths, Some(save_result(true).to_vec()));

        assert!(Client::new(paths).save().unwrap());
        daemon.join().unwrap();
    }

    #[test]
    fn missing_daemon_is_reported() {
        let (_temp, paths) = setup();
        let started = Instant::now();
        let err = Client::new(paths).print().unwrap_err();
        assert!(matches!(err, ClientError::NotRunning(_)));
        assert!(started.elapsed() >= CONNECT_TIMEOUT);
    }

    #[test]
    fn missing_fifo_dir_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let paths = FifoPaths::with_dir(temp.path().join("absent"));
        assert!(matches!(
            Client::new(paths).save(),
            Err(ClientError::NotRunning(_))
        ));
    }

    #[test]
    fn open_failures_name_the_fifo() {
        let temp = tempfile::tempdir().unwrap();
        let paths = FifoPaths::with_dir(temp.path().join("absent"));
        let err = Client::new(paths.clone()).receive().unwrap_err();
        assert!(matches!(err, ClientError::Io { context: "open content fifo", .. }));
        let message = err.to_string();
        assert!(
            message.contains(&paths.content().display().to_string()),
            "{message}"
        );
    }

    #[test]
    fn fifo_dir_follows_environment() {
        let _lock = env_lock();
        {
            let _dir = EnvGuard::set(FIFO_DIR_ENV, "/run/user/1000/clipsim");
            assert_eq!(
                FifoPaths::from_env().command(),
                PathBuf::from("/run/user/1000/clipsim/command.fifo")
            );
        }
        let _unset = EnvGuard::unset(FIFO_DIR_ENV);
        assert_eq!(FifoPaths::from_env().dir(), PathBuf::from("/tmp/clipsim"));
    }
}
