use mxforge::{Component, DiagramOperation, Engine, StructuralViolation};
use serde::Serialize;
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Engine(mxforge::Error),
    Json(serde_json::Error),
    Invalid,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Engine(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Invalid => write!(f, "document is invalid"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<mxforge::Error> for CliError {
    fn from(value: mxforge::Error) -> Self {
        Self::Engine(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Validate,
    Fix,
    Analyze,
    Convert,
    Apply,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    ops: Option<String>,
    out: Option<String>,
    json: bool,
    pretty: bool,
}

#[derive(Serialize)]
struct ValidateOut<'a> {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation: Option<&'a StructuralViolation>,
}

fn usage() -> &'static str {
    "mxforge\n\
\n\
USAGE:\n\
  mxforge [validate] [--json] [--pretty] [<path>|-]\n\
  mxforge fix [--out <path>] [<path>|-]\n\
  mxforge analyze [--json] [--pretty] [<path>|-]\n\
  mxforge convert [--out <path>] [<components.json>|-]\n\
  mxforge apply --ops <ops.json> [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - validate prints 'valid' or the first violated invariant; --json emits a machine-readable report.\n\
  - fix prints the repaired XML to stdout (or --out) and lists applied fixes on stderr.\n\
  - analyze prints a one-line summary; --json emits the typed components plus the summary.\n\
  - convert reads a JSON array of components and prints the diagram XML.\n\
  - apply reads a JSON array of edit operations from --ops and applies it to the input document.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "validate" => args.command = Command::Validate,
            "fix" => args.command = Command::Fix,
            "analyze" => args.command = Command::Analyze,
            "convert" => args.command = Command::Convert,
            "apply" => args.command = Command::Apply,
            "--json" => args.json = true,
            "--pretty" => args.pretty = true,
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--ops" => {
                let Some(ops) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.ops = Some(ops.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    Ok(())
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let engine = Engine::new();

    match args.command {
        Command::Validate => {
            let text = read_input(args.input.as_deref())?;
            match engine.validate(&text) {
                None => {
                    if args.json {
                        write_json(
                            &ValidateOut {
                                valid: true,
                                violation: None,
                            },
                            args.pretty,
                        )?;
                    } else {
                        println!("valid");
                    }
                    Ok(())
                }
                Some(violation) => {
                    if args.json {
                        write_json(
                            &ValidateOut {
                                valid: false,
                                violation: Some(&violation),
                            },
                            args.pretty,
                        )?;
                    } else {
                        println!("{violation}");
                        if !violation.ids.is_empty() {
                            println!("offending ids: {}", violation.ids.join(", "));
                        }
                        println!("hint: {}", violation.hint);
                    }
                    Err(CliError::Invalid)
                }
            }
        }
        Command::Fix => {
            let text = read_input(args.input.as_deref())?;
            let report = engine.validate_and_fix(&text);
            for fix in &report.applied_fixes {
                eprintln!("applied: {fix}");
            }
            if !report.valid {
                if let Some(violation) = &report.violation {
                    eprintln!("{violation}");
                }
                return Err(CliError::Invalid);
            }
            let output = report.fixed_xml.unwrap_or(text);
            write_text(&output, args.out.as_deref())?;
            Ok(())
        }
        Command::Analyze => {
            let text = read_input(args.input.as_deref())?;
            let analysis = engine.analyze(&text)?;
            if args.json {
                write_json(&analysis, args.pretty)?;
            } else {
                println!("{}", analysis.summary);
            }
            Ok(())
        }
        Command::Convert => {
            let text = read_input(args.input.as_deref())?;
            let components: Vec<Component> = serde_json::from_str(&text)?;
            write_text(&engine.components_to_xml(&components), args.out.as_deref())?;
            Ok(())
        }
        Command::Apply => {
            let Some(ops_path) = args.ops.as_deref() else {
                return Err(CliError::Usage(usage()));
            };
            let ops: Vec<DiagramOperation> =
                serde_json::from_str(&std::fs::read_to_string(ops_path)?)?;
            let text = read_input(args.input.as_deref())?;
            let result = engine.apply_operations(&text, &ops)?;
            write_text(&result, args.out.as_deref())?;
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
