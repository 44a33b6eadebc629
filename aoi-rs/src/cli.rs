//! Command-line argument parsing.
//!
//! Usage:
//!   aoi [-sTd] [-C[<config>]] [-e<text>] [-u<user>] [-c<script>] [<file>...]
//!
//! A file argument of `-` reads the script from stdin.
//!
//! `-C<file>` names a config file.  The separate form `-C <file>` is only
//! recognised when `<file>` ends in `.toml`; otherwise `-C` skips config and
//! the next argument is a script file, so `-C script.aoi` runs `script.aoi`
//! with built-in defaults.

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Config-file specification.
    pub config: ConfigFile,
    /// Inline script to run before any files (`-c<script>`).
    pub script: Option<String>,
    /// Script files to run in order.
    pub files: Vec<PathBuf>,
    /// Text of the triggering message (`-e<text>`).
    pub event_text: Option<String>,
    /// Author of the triggering message (`-u<user>`).
    pub username: Option<String>,
    /// Strict bracket checking (`-s`).
    pub strict: bool,
    /// Keep surrounding whitespace in results (`-T`).
    pub no_trim: bool,
    /// Debug logging when `RUST_LOG` is unset (`-d`).
    pub debug: bool,
}

/// How to choose the config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Look for `./aoi.toml`, then `~/.aoi.toml` (default).
    #[default]
    Search,
    /// `-C` with no file argument: use built-in defaults.
    Skip,
    /// `-C<file>`, or `-C <file>` when the name ends in `.toml`: load this
    /// specific file.
    Explicit(PathBuf),
}

impl CliArgs {
    /// `true` when there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.script.is_none() && self.files.is_empty()
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            args.files.extend(argv[i + 1..].iter().map(PathBuf::from));
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            args.files.push(PathBuf::from(arg));
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                's' => args.strict = true,
                'T' => args.no_trim = true,
                'd' => args.debug = true,

                // -C[<file>]
                'C' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && argv[i + 1].ends_with(".toml") {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                // Value flags: attached (`-cfoo`) or separate (`-c foo`).
                flag @ ('c' | 'e' | 'u') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'c' => args.script = Some(value),
                        'e' => args.event_text = Some(value),
                        _ => args.username = Some(value),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the config file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_config() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("./aoi.toml")];
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".aoi.toml"));
    }
    candidates.into_iter().find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
