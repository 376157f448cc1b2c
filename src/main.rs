use std::path::PathBuf;

use anyhow::{bail, Result};

const HELP: &str = "meme-feed — Browse, comment on and post memes from the terminal.

Usage:
  meme-feed [options]
  meme-feed post <picture> --description <text> [--caption <text>]... [options]

Options:
  --token <jwt>        Sign in with this token (saved to the config file)
  --config <path>      Use this config file instead of the default
  --demo               Browse built-in sample memes without a server
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

#[derive(Debug, Default)]
struct Cli {
    config_file: Option<PathBuf>,
    token: Option<String>,
    demo: bool,
    post: Option<meme_feed::app::PostOptions>,
    exit: bool,
}

fn main() {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            std::process::exit(2);
        }
    };
    if cli.exit {
        return;
    }

    let result = match cli.post {
        Some(post) => meme_feed::app::post(cli.config_file, cli.token, post).map(|()| {
            println!("Meme posted.");
        }),
        None => meme_feed::run(meme_feed::app::RunOptions {
            config_file: cli.config_file,
            token: cli.token,
            demo: cli.demo,
        }),
    };

    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut args = args.into_iter();
    let mut picture: Option<PathBuf> = None;
    let mut description: Option<String> = None;
    let mut captions = Vec::new();
    let mut posting = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("meme-feed {}", meme_feed::VERSION);
                cli.exit = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                cli.exit = true;
            }
            "--demo" => cli.demo = true,
            "--token" => cli.token = Some(value_for(&mut args, "--token")?),
            "--config" => cli.config_file = Some(PathBuf::from(value_for(&mut args, "--config")?)),
            "--description" => description = Some(value_for(&mut args, "--description")?),
            "--caption" => captions.push(value_for(&mut args, "--caption")?),
            "post" if !posting => posting = true,
            other if posting && picture.is_none() && !other.starts_with('-') => {
                picture = Some(PathBuf::from(other));
            }
            other => bail!("unexpected argument: {other}"),
        }
    }

    if cli.exit {
        return Ok(cli);
    }
    if posting {
        let Some(picture) = picture else {
            bail!("post: a picture path is required");
        };
        let description = description.unwrap_or_default();
        cli.post = Some(meme_feed::app::PostOptions {
            picture,
            description,
            captions,
        });
    } else if description.is_some() || !captions.is_empty() {
        bail!("--description and --caption only apply to `post`");
    }
    Ok(cli)
}

fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    match args.next() {
        Some(value) if !value.starts_with("--") => Ok(value),
        _ => bail!("{flag} needs a value"),
    }
}
