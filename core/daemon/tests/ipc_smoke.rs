//! End-to-end command round-trips over real FIFOs in a temp directory.

use clipsim_core::{History, HistoryFile, HistoryPolicy, ImageStore, PublishError, SelectionWriter};
use clipsim_daemon::ipc::serve_one;
use clipsim_daemon::{fifo, Capture, IpcError, SelectionTarget, SharedState};
use clipsim_protocol::{encode_id, Command, FifoPaths, ProtocolError, IMAGE_END};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Recorder {
    published: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SelectionWriter for Recorder {
    fn publish(&self, content: &[u8], _image: bool) -> Result<(), PublishError> {
        self.published.lock().unwrap().push(content.to_vec());
        Ok(())
    }
}

struct Fixture {
    _temp: TempDir,
    cache: TempDir,
    paths: FifoPaths,
    state: Arc<SharedState>,
    recorder: Recorder,
}

impl Fixture {
    fn new(words: &[&str]) -> Self {
        let temp = TempDir::new().expect("fifo dir");
        let cache = TempDir::new().expect("cache dir");
        let paths = FifoPaths::with_dir(temp.path().join("clipsim"));
        fifo::prepare(&paths).expect("prepare fifos");

        let recorder = Recorder::default();
        let history = History::new(HistoryPolicy::default(), Box::new(recorder.clone()))
            .with_file(HistoryFile::in_cache_dir(cache.path()))
            .with_images(ImageStore::new(cache.path().join("images")));
        let state = Arc::new(SharedState::new(history));
        for word in words {
            state.ingest(Capture::Content {
                target: SelectionTarget::Utf8,
                bytes: word.as_bytes().to_vec(),
            });
        }

        Self {
            _temp: temp,
            cache,
            paths,
            state,
            recorder,
        }
    }

    /// Serves exactly `rounds` commands on a background thread.
    fn serve(&self, rounds: usize) -> JoinHandle<Vec<Result<Command, IpcError>>> {
        let paths = self.paths.clone();
        let state = Arc::clone(&self.state);
        thread::spawn(move || (0..rounds).map(|_| serve_one(&paths, &state)).collect())
    }

    fn send(&self, byte: u8) {
        let mut fifo = OpenOptions::new()
            .write(true)
            .open(self.paths.command())
            .expect("open command fifo");
        fifo.write_all(&[byte]).expect("write command");
    }

    fn send_id(&self, id: i32) {
        let mut fifo = OpenOptions::new()
            .write(true)
            .open(self.paths.passid())
            .expect("open id fifo");
        fifo.write_all(&encode_id(id)).expect("write id");
    }

    fn receive(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        File::open(self.paths.content())
            .expect("open content fifo")
            .read_to_end(&mut bytes)
            .expect("read content");
        bytes
    }

    fn request(&self, command: Command, id: Option<i32>) -> Vec<u8> {
        self.send(command.as_byte());
        if let Some(id) = id {
            self.send_id(id);
        }
        if command.has_response() {
            self.receive()
        } else {
            Vec::new()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.state
            .lock()
            .entries()
            .iter()
            .map(|entry| String::from_utf8_lossy(entry.content()).into_owned())
            .collect()
    }
}

fn all_ok(handle: JoinHandle<Vec<Result<Command, IpcError>>>) -> Vec<Command> {
    handle
        .join()
        .expect("server thread")
        .into_iter()
        .map(|result| result.expect("command round-trip"))
        .collect()
}

#[test]
fn print_lists_newest_first() {
    let fixture = Fixture::new(&["one", "two", "three"]);
    let server = fixture.serve(1);

    let listing = fixture.request(Command::Print, None);
    assert_eq!(listing, b"002 three\0001 two\0000 one\0".to_vec());
    assert_eq!(all_ok(server), vec![Command::Print]);
}

#[test]
fn print_on_empty_history() {
    let fixture = Fixture::new(&[]);
    let server = fixture.serve(1);

    let listing = fixture.request(Command::Print, None);
    assert_eq!(listing, b"000 Clipboard history empty\0".to_vec());
    all_ok(server);
}

#[test]
fn save_reports_success_and_failure() {
    let fixture = Fixture::new(&[]);
    let server = fixture.serve(2);

    // Nothing to save yet.
    assert_eq!(fixture.request(Command::Save, None), vec![0]);

    fixture.state.ingest(Capture::Content {
        target: SelectionTarget::Utf8,
        bytes: b"persist me".to_vec(),
    });
    assert_eq!(fixture.request(Command::Save, None), vec![1]);
    all_ok(server);

    let saved = HistoryFile::in_cache_dir(fixture.cache.path())
        .read()
        .expect("read history");
    assert_eq!(saved, vec![b"persist me".to_vec()]);
}

#[test]
fn info_returns_length_and_content() {
    let fixture = Fixture::new(&["alpha", "beta gamma"]);
    let server = fixture.serve(2);

    assert_eq!(
        fixture.request(Command::Info, Some(-1)),
        b"Length: 10\nbeta gamma".to_vec()
    );
    // Out of range: the daemon closes the pipe without writing.
    assert!(fixture.request(Command::Info, Some(9)).is_empty());
    all_ok(server);
}

#[test]
fn info_on_image_sends_path() {
    let fixture = Fixture::new(&[]);
    let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png.resize(64, 0x33);
    fixture.state.ingest(Capture::Content {
        target: SelectionTarget::Png,
        bytes: png.clone(),
    });
    let server = fixture.serve(1);

    let response = fixture.request(Command::Info, Some(0));
    assert_eq!(response[0], IMAGE_END);
    let expected = ImageStore::new(fixture.cache.path().join("images")).path_for(&png);
    assert_eq!(&response[1..], expected.to_string_lossy().as_bytes());
    all_ok(server);
}

#[test]
fn copy_publishes_and_promotes() {
    let fixture = Fixture::new(&["one", "two", "three"]);
    let server = fixture.serve(2);

    fixture.request(Command::Copy, Some(0));
    let listing = fixture.request(Command::Print, None);
    assert_eq!(all_ok(server), vec![Command::Copy, Command::Print]);

    assert_eq!(fixture.texts(), vec!["two", "three", "one"]);
    assert_eq!(listing, b"002 one\0001 three\0000 two\0".to_vec());
    assert_eq!(
        *fixture.recorder.published.lock().unwrap(),
        vec![b"one".to_vec()]
    );
    assert!(fixture.state.lock().is_recovered());
}

#[test]
fn remove_deletes_entry() {
    let fixture = Fixture::new(&["one", "two", "three"]);
    let server = fixture.serve(2);

    fixture.request(Command::Remove, Some(1));
    let listing = fixture.request(Command::Print, None);
    all_ok(server);

    assert_eq!(fixture.texts(), vec!["one", "three"]);
    assert_eq!(listing, b"001 three\0000 one\0".to_vec());
}

#[test]
fn invalid_command_does_not_stop_the_server() {
    let fixture = Fixture::new(&["kept"]);
    let server = fixture.serve(2);

    fixture.send(b'z');
    // The invalid byte gets no response; give the server time to close the pipe.
    thread::sleep(Duration::from_millis(100));
    let listing = fixture.request(Command::Print, None);

    let results = server.join().expect("server thread");
    assert!(matches!(
        results[0],
        Err(IpcError::Protocol(ProtocolError::InvalidCommand(b'z')))
    ));
    assert!(matches!(results[1], Ok(Command::Print)));
    assert_eq!(listing, b"000 kept\0".to_vec());
}
