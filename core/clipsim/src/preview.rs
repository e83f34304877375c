//! Launches the terminal image previewer for INFO on image entries.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, ExitStatus};

const STIV: &str = "stiv";
const DEFAULT_COLUMNS: &str = "80";
const DEFAULT_LINES: &str = "24";

/// Builds the previewer argv. `stiv` wants the terminal size after the path;
/// anything else gets the path alone. Extra words in `previewer` are passed
/// through as leading arguments.
pub fn argv(
    previewer: &str,
    path: &Path,
    columns: Option<&str>,
    lines: Option<&str>,
) -> Vec<OsString> {
    let mut argv: Vec<OsString> = previewer.split_whitespace().map(OsString::from).collect();
    argv.push(path.as_os_str().to_os_string());
    if previewer == STIV {
        argv.push(OsString::from(columns.unwrap_or(DEFAULT_COLUMNS)));
        argv.push(OsString::from(lines.unwrap_or(DEFAULT_LINES)));
    }
    argv
}

pub fn run(previewer: &str, path: &Path) -> std::io::Result<ExitStatus> {
    if previewer.trim().is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty image previewer command",
        ));
    }
    let columns = std::env::var("COLUMNS").ok();
    let lines = std::env::var("LINES").ok();
    let argv = argv(previewer, path, columns.as_deref(), lines.as_deref());
    let (program, args) = argv.split_at(1);
    tracing::debug!(previewer = %previewer, path = %path.display(), "Launching image previewer");
    Command::new(&program[0]).args(args).status()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(argv: Vec<OsString>) -> Vec<String> {
        argv.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_previewer_takes_the_path() {
        let argv = argv("chafa", Path::new("/c/img.png"), Some("120"), Some("40"));
        assert_eq!(strings(argv), vec!["chafa", "/c/img.png"]);
    }

    #[test]
    fn stiv_gets_terminal_size() {
        let argv = argv("stiv", Path::new("/c/img.png"), Some("120"), Some("40"));
        assert_eq!(strings(argv), vec!["stiv", "/c/img.png", "120", "40"]);
    }

    #[test]
    fn stiv_falls_back_to_80_by_24() {
        let argv = argv("stiv", Path::new("/c/img.png"), None, None);
        assert_eq!(strings(argv), vec!["stiv", "/c/img.png", "80", "24"]);
    }

    #[test]
    fn previewer_arguments_are_kept() {
        let argv = argv("chafa --size 40x20", Path::new("/c/img.png"), None, None);
        assert_eq!(strings(argv), vec!["chafa", "--size", "40x20", "/c/img.png"]);
    }

    #[test]
    fn blank_previewer_is_rejected() {
        assert!(run("   ", Path::new("/c/img.png")).is_err());
    }
}
