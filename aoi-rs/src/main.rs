use std::path::Path;

use aoi::cli::{self, CliArgs, ConfigFile};
use aoi::config::Config;
use aoi::script::{standard_library, MessageEvent, Runtime, ScriptAction};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: aoi [-sTd] [-C[<config>]] [-e<text>] [-u<user>] [-c<script>] [<file>...]
  -C<config>   load <config>; `-C <config>` works only for names ending in .toml
  -C           skip config files";

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("aoi: {e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    init_tracing(args.debug);

    // ── Load config ───────────────────────────────────────────────────────────
    let config = match &args.config {
        ConfigFile::Skip => Config::default(),
        ConfigFile::Explicit(path) => match load_config(path) {
            Some(c) => c,
            None => std::process::exit(1),
        },
        ConfigFile::Search => cli::find_config()
            .and_then(|path| load_config(&path))
            .unwrap_or_default(),
    };

    // ── Build the runtime (CLI flags override the file) ───────────────────────
    let mut options = config.runtime;
    if args.strict {
        options.strict_brackets = true;
    }
    if args.no_trim {
        options.trim_output = false;
    }
    let runtime = Runtime::new(standard_library())
        .with_config(config)
        .with_options(options);

    let event = MessageEvent {
        text: args.event_text.clone().unwrap_or_default(),
        username: args.username.clone(),
    };

    // ── Run every script in order ─────────────────────────────────────────────
    let mut ok = true;
    for (name, source) in sources(&args) {
        let source = match source {
            Ok(s) => s,
            Err(e) => {
                eprintln!("aoi: {name}: {e}");
                ok = false;
                continue;
            }
        };
        ok &= run_script(&runtime, &name, &source, &event).await;
    }

    if !ok {
        std::process::exit(1);
    }
}

/// Log to stderr.  `RUST_LOG` wins; otherwise `-d` turns on engine debug
/// output and the default is warnings only.
fn init_tracing(debug: bool) {
    let fallback = if debug { "aoi=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Option<Config> {
    match Config::load_file(path) {
        Ok((config, warnings)) => {
            for w in warnings {
                eprintln!("aoi: warning: {}: {w}", path.display());
            }
            Some(config)
        }
        Err(e) => {
            eprintln!("aoi: {e}");
            None
        }
    }
}

/// `(display name, source text)` for `-c` and each file; stdin when there
/// is nothing else to run.
fn sources(args: &CliArgs) -> Vec<(String, std::io::Result<String>)> {
    let mut out = Vec::new();
    if let Some(script) = &args.script {
        out.push(("<command>".to_owned(), Ok(script.clone())));
    }
    for path in &args.files {
        if path.as_os_str() == "-" {
            out.push(("<stdin>".to_owned(), std::io::read_to_string(std::io::stdin())));
        } else {
            out.push((path.display().to_string(), std::fs::read_to_string(path)));
        }
    }
    if args.is_empty() {
        out.push(("<stdin>".to_owned(), std::io::read_to_string(std::io::stdin())));
    }
    out
}

/// Run one script, print its queued actions and result.  Returns `false`
/// if the run failed.
async fn run_script(runtime: &Runtime, name: &str, source: &str, event: &MessageEvent) -> bool {
    let mut ctx = runtime.prepare_context(name).with_event(event.clone());
    match runtime.run_with(&mut ctx, source).await {
        Ok(value) => {
            for action in ctx.take_actions() {
                match action {
                    ScriptAction::Send(text) => println!("send: {text}"),
                    ScriptAction::Reply(text) => println!("reply: {text}"),
                }
            }
            if !value.is_undefined() {
                println!("{value}");
            }
            true
        }
        Err(e) => {
            eprintln!("aoi: {name}: {e}");
            if e.is_internal() {
                eprintln!("aoi: internal error, please report it");
            }
            false
        }
    }
}
