use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use pyscript::{Config, Interpreter};

enum Input {
    File(String),
    Command(String),
    Expression(String),
    Stdin,
}

fn setup_logging() {
    let filter = EnvFilter::try_from_env("PYS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut input = Input::Stdin;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing file name after {arg}"))?;
                config_path = Some(path.into());
            }
            "-c" | "-e" | "--eval" => {
                let text = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing source after {arg}"))?;
                input = if arg == "-c" {
                    Input::Command(text)
                } else {
                    Input::Expression(text)
                };
                break;
            }
            flag if flag.starts_with('-') && flag != "-" => bail!("Unknown option '{flag}'"),
            _ => {
                if arg != "-" {
                    input = Input::File(arg);
                }
                break;
            }
        }
    }
    if args.next().is_some() {
        bail!("Only one program is supported");
    }

    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut interpreter = Interpreter::new(config);

    let status = match input {
        Input::File(path) => {
            let source = fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?;
            interpreter.run_source(&path, &source)
        }
        Input::Command(source) => interpreter.run_source("<string>", &source),
        Input::Expression(source) => interpreter.eval_source("<string>", &source),
        Input::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            interpreter.run_source("<stdin>", &buffer)
        }
    };
    std::process::exit(status)
}
