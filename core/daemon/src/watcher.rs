//! X11 CLIPBOARD watcher.
//!
//! Subscribes to XFixes selection events on the root window. Every owner
//! change triggers a conversion request on a private, unmapped window; the
//! converted bytes are handed to `SharedState::ingest`. Owner exit triggers
//! `SharedState::owner_gone`.

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::thread;
use std::time::{Duration, Instant};

use x11rb::connection::{Connection, RequestConnection as _};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xfixes::{self, ConnectionExt as _, SelectionEvent, SelectionEventMask};
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ConnectionExt as _, CreateWindowAux, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::error::DaemonError;
use crate::state::{Capture, SelectionTarget, SharedState};

/// How long a selection owner gets to answer a conversion request.
const CONVERT_TIMEOUT: Duration = Duration::from_secs(1);

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        CLIPBOARD,
        UTF8_STRING,
        TARGETS,
        INCR,
        IMAGE_PNG: b"image/png",
    }
}

impl Atoms {
    fn target(&self, target: SelectionTarget) -> Atom {
        match target {
            SelectionTarget::Utf8 => self.UTF8_STRING,
            SelectionTarget::Png => self.IMAGE_PNG,
            SelectionTarget::Targets => self.TARGETS,
        }
    }
}

/// What an XFixes selection event means for the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnerEvent {
    Changed,
    Gone,
    Ignored,
}

fn owner_event(subtype: SelectionEvent) -> OwnerEvent {
    if subtype == SelectionEvent::SET_SELECTION_OWNER {
        OwnerEvent::Changed
    } else if subtype == SelectionEvent::SELECTION_WINDOW_DESTROY
        || subtype == SelectionEvent::SELECTION_CLIENT_CLOSE
    {
        OwnerEvent::Gone
    } else {
        OwnerEvent::Ignored
    }
}

/// One outstanding `ConvertSelection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConversionRequest {
    requestor: Window,
    selection: Atom,
    target: Atom,
}

impl ConversionRequest {
    /// A late answer to an earlier, timed-out request names a different target.
    fn is_answered_by(&self, requestor: Window, selection: Atom, target: Atom) -> bool {
        self.requestor == requestor && self.selection == selection && self.target == target
    }
}

pub struct SelectionWatcher {
    conn: RustConnection,
    window: Window,
    property: Atom,
    atoms: Atoms,
    debounce: Duration,
    /// Events that arrived while waiting for a conversion reply.
    pending: VecDeque<Event>,
}

impl SelectionWatcher {
    /// Opens the display named by `DISPLAY` and subscribes to CLIPBOARD changes.
    pub fn connect(debounce: Duration) -> Result<Self, DaemonError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn.setup().roots[screen_num].root;

        if conn
            .extension_information(xfixes::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Err(DaemonError::ExtensionMissing(xfixes::X11_EXTENSION_NAME));
        }
        let version = conn.xfixes_query_version(5, 0)?.reply()?;
        tracing::debug!(
            major = version.major_version,
            minor = version.minor_version,
            "XFixes available"
        );

        let atoms = Atoms::new(&conn)?.reply()?;
        let property_name = format!("CLIPSIM_DATA_{}", std::process::id());
        let property = conn
            .intern_atom(false, property_name.as_bytes())?
            .reply()?
            .atom;

        let window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;

        conn.xfixes_select_selection_input(
            root,
            atoms.CLIPBOARD,
            SelectionEventMask::SET_SELECTION_OWNER
                | SelectionEventMask::SELECTION_WINDOW_DESTROY
                | SelectionEventMask::SELECTION_CLIENT_CLOSE,
        )?;
        conn.flush()?;

        tracing::info!(window, "Watching CLIPBOARD selection");
        Ok(Self {
            conn,
            window,
            property,
            atoms,
            debounce,
            pending: VecDeque::new(),
        })
    }

    /// Processes selection events until the X connection fails.
    pub fn run(mut self, state: &SharedState) -> Result<(), DaemonError> {
        loop {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => self.conn.wait_for_event()?,
            };

            let notify = match event {
                Event::XfixesSelectionNotify(notify) => notify,
                Event::Error(err) => {
                    tracing::warn!(error = ?err, "X11 error event");
                    continue;
                }
                _ => continue,
            };
            if notify.selection != self.atoms.CLIPBOARD {
                continue;
            }

            match owner_event(notify.subtype) {
                OwnerEvent::Changed => {
                    if notify.owner == self.window {
                        continue;
                    }
                    thread::sleep(self.debounce);
                    let capture = self.capture()?;
                    state.ingest(capture);
                }
                OwnerEvent::Gone => {
                    tracing::debug!("CLIPBOARD owner went away");
                    state.owner_gone();
                }
                OwnerEvent::Ignored => {}
            }
        }
    }

    /// Asks the owner for each target in turn and returns the first that converts.
    fn capture(&mut self) -> Result<Capture, DaemonError> {
        for target in SelectionTarget::ALL {
            let request = ConversionRequest {
                requestor: self.window,
                selection: self.atoms.CLIPBOARD,
                target: self.atoms.target(target),
            };
            self.conn.convert_selection(
                request.requestor,
                request.selection,
                request.target,
                self.property,
                x11rb::CURRENT_TIME,
            )?;
            self.conn.flush()?;

            let Some(notify) = self.wait_for_selection_notify(request)? else {
                tracing::warn!(target = target.name(), "Selection owner did not answer");
                continue;
            };
            if notify.property == x11rb::NONE {
                tracing::debug!(target = target.name(), "Conversion refused");
                continue;
            }

            let reply = self
                .conn
                .get_property(
                    true,
                    self.window,
                    self.property,
                    AtomEnum::ANY,
                    0,
                    u32::MAX / 4,
                )?
                .reply()?;
            if reply.type_ == self.atoms.INCR {
                return Ok(Capture::Incr);
            }
            return Ok(Capture::Content {
                target,
                bytes: reply.value,
            });
        }
        Ok(Capture::Empty)
    }

    /// Blocks until the SelectionNotify answering `request` arrives, queueing
    /// other events for the main loop. `None` on timeout.
    fn wait_for_selection_notify(
        &mut self,
        request: ConversionRequest,
    ) -> Result<Option<xproto::SelectionNotifyEvent>, DaemonError> {
        let deadline = Instant::now() + CONVERT_TIMEOUT;
        loop {
            while let Some(event) = self.conn.poll_for_event()? {
                match event {
                    Event::SelectionNotify(notify) if notify.requestor == self.window => {
                        let answered = request.is_answered_by(
                            notify.requestor,
                            notify.selection,
                            notify.target,
                        );
                        if answered {
                            return Ok(Some(notify));
                        }
                        tracing::debug!(
                            target_atom = notify.target,
                            "Discarding stale SelectionNotify"
                        );
                    }
                    other => self.pending.push_back(other),
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            wait_readable(self.conn.stream().as_raw_fd(), remaining)?;
        }
    }
}

/// Sleeps in `poll(2)` until the X socket is readable or `timeout` passes.
fn wait_readable(fd: RawFd, timeout: Duration) -> Result<(), DaemonError> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;
    // SAFETY: `pollfd` is a single valid entry that outlives the call.
    let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(ConnectionError::IoError(err).into());
        }
    }
    Ok(())
}
