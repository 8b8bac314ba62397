use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use activity_core::model::{
    ActivityKind, ContentScopeId, SessionMode, StudentId, SubjectId, TermId,
};
use backend::http::DEFAULT_API_URL;
use backend::{ActivityBackend, HttpBackend, HttpBackendConfig, demo_backend};
use services::{SessionRequest, SessionRunner};

mod console;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingRequired { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidKind { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingRequired { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidKind { raw } => write!(f, "unknown activity kind: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id<T: FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn parse_number(flag: &'static str, raw: String) -> Result<u32, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  activity-runner run   [--kind <code>] [--count <n>] [--exam [--limit <secs>]]");
    eprintln!("                        --student <uuid> --subject <uuid> --term <uuid> [--scope <uuid>]");
    eprintln!("  activity-runner kinds # list the activity kind catalog");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --api <url>      backend base URL (default {DEFAULT_API_URL})");
    eprintln!("  --token <token>  bearer token");
    eprintln!("  --demo           use built-in sample content instead of the API");
    eprintln!();
    eprintln!("Kinds: QUIZ, EXAM_STYLE, MATCH, CLOZE, REVIEW (default QUIZ)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACTIVITY_API_URL, ACTIVITY_API_TOKEN, ACTIVITY_STUDENT_ID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Kinds,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "kinds" => Some(Self::Kinds),
            _ => None,
        }
    }
}

struct Args {
    api_url: String,
    token: Option<String>,
    demo: bool,
    student_id: Option<StudentId>,
    subject_id: Option<SubjectId>,
    term_id: Option<TermId>,
    content_scope_id: Option<ContentScopeId>,
    kind: ActivityKind,
    item_count: Option<u32>,
    exam: bool,
    limit_secs: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            api_url: std::env::var("ACTIVITY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            token: std::env::var("ACTIVITY_API_TOKEN").ok(),
            demo: false,
            student_id: std::env::var("ACTIVITY_STUDENT_ID")
                .ok()
                .and_then(|value| value.parse().ok()),
            subject_id: None,
            term_id: None,
            content_scope_id: None,
            kind: ActivityKind::Quiz,
            item_count: None,
            exam: false,
            limit_secs: 0,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api_url = require_value(args, "--api")?,
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                "--demo" => parsed.demo = true,
                "--student" => {
                    parsed.student_id = Some(parse_id("--student", require_value(args, "--student")?)?);
                }
                "--subject" => {
                    parsed.subject_id = Some(parse_id("--subject", require_value(args, "--subject")?)?);
                }
                "--term" => {
                    parsed.term_id = Some(parse_id("--term", require_value(args, "--term")?)?);
                }
                "--scope" => {
                    parsed.content_scope_id =
                        Some(parse_id("--scope", require_value(args, "--scope")?)?);
                }
                "--kind" => {
                    let raw = require_value(args, "--kind")?;
                    parsed.kind = raw.parse().map_err(|_| ArgsError::InvalidKind { raw })?;
                }
                "--count" => {
                    parsed.item_count = Some(parse_number("--count", require_value(args, "--count")?)?);
                }
                "--exam" => parsed.exam = true,
                "--limit" => {
                    parsed.limit_secs = parse_number("--limit", require_value(args, "--limit")?)?;
                    parsed.exam = true;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    // Demo runs make up any ids that were not given.
    fn session_request(&self) -> Result<SessionRequest, ArgsError> {
        let student_id = match (self.student_id, self.demo) {
            (Some(id), _) => id,
            (None, true) => StudentId::random(),
            (None, false) => return Err(ArgsError::MissingRequired { flag: "--student" }),
        };
        let subject_id = match (self.subject_id, self.demo) {
            (Some(id), _) => id,
            (None, true) => SubjectId::random(),
            (None, false) => return Err(ArgsError::MissingRequired { flag: "--subject" }),
        };
        let term_id = match (self.term_id, self.demo) {
            (Some(id), _) => id,
            (None, true) => TermId::random(),
            (None, false) => return Err(ArgsError::MissingRequired { flag: "--term" }),
        };

        let mut request = SessionRequest::new(student_id, subject_id, term_id, self.kind);
        if let Some(scope) = self.content_scope_id {
            request = request.with_content_scope(scope);
        }
        if let Some(count) = self.item_count {
            request = request.with_item_count(count);
        }
        if self.exam {
            request = request.with_mode(SessionMode::exam_with_limit_secs(self.limit_secs));
        }
        Ok(request)
    }

    fn backend(&self) -> Result<Arc<dyn ActivityBackend>, Box<dyn std::error::Error>> {
        if self.demo {
            return Ok(Arc::new(demo_backend()));
        }
        let config = HttpBackendConfig::new(&self.api_url, self.token.clone())?;
        log::info!("using activity API at {}", config.base_url);
        Ok(Arc::new(HttpBackend::new(config)))
    }
}

// `None` asks for help. A leading flag means `run`.
fn split_command(mut argv: Vec<String>) -> Result<Option<(Command, Vec<String>)>, ArgsError> {
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => return Ok(None),
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => {
            Command::from_arg(first).ok_or_else(|| ArgsError::UnknownCommand(first.to_string()))?
        }
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }
    Ok(Some((cmd, argv)))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    // Errors are printed once by `main`; only the usage goes out here.
    let Some((cmd, argv)) = split_command(argv).inspect_err(|_| print_usage())? else {
        print_usage();
        return Ok(());
    };
    let parsed = Args::parse(&mut argv.into_iter()).inspect_err(|_| print_usage())?;
    let backend = parsed.backend()?;

    match cmd {
        Command::Kinds => {
            for kind in backend.activity_kinds().await? {
                match kind.name {
                    Some(name) => println!("{}\t{name}", kind.code),
                    None => println!("{}", kind.code),
                }
            }
            Ok(())
        }
        Command::Run => {
            let request = parsed.session_request().inspect_err(|_| print_usage())?;
            let mut runner = SessionRunner::new(backend);
            console::Console::new().run(&mut runner, request).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        // Printed once here; library crates only log.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn subcommand_is_split_from_flags() {
        let (cmd, rest) = split_command(argv(&["kinds", "--demo"])).unwrap().unwrap();
        assert_eq!(cmd, Command::Kinds);
        assert_eq!(rest, ["--demo"]);

        let (cmd, rest) = split_command(argv(&["--demo"])).unwrap().unwrap();
        assert_eq!(cmd, Command::Run);
        assert_eq!(rest, ["--demo"]);

        assert!(split_command(argv(&["--help"])).unwrap().is_none());
    }

    #[test]
    fn argument_errors_are_returned_not_printed() {
        let err = split_command(argv(&["bogus"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown subcommand: bogus");

        let err = Args::parse(&mut argv(&["--count", "many"]).into_iter()).err().unwrap();
        assert_eq!(err.to_string(), "invalid --count value: many");

        let err = Args::parse(&mut argv(&["--kind"]).into_iter()).err().unwrap();
        assert_eq!(err.to_string(), "--kind requires a value");
    }
}
