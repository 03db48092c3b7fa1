use std::io::Read as _;
use std::{env, fs, process};

use railviz::{EndClass, TextSettings, VectorSettings, load, render_text, render_vector};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut text_mode = false;
    let mut reverse = false;
    let mut simple = false;
    let mut max_width: Option<f64> = None;
    let mut path: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text" => text_mode = true,
            "--svg" => text_mode = false,
            "--reverse" => reverse = true,
            "--simple" => simple = true,
            "--max-width" => match args.next().and_then(|v| v.parse::<f64>().ok()) {
                Some(v) => max_width = Some(v),
                None => usage(),
            },
            "--help" | "-h" => usage(),
            other if path.is_none() && !other.starts_with('-') => path = Some(other.to_owned()),
            _ => usage(),
        }
    }
    let Some(path) = path else { usage() };

    let source = match read_source(&path) {
        Ok(source) => source,
        Err(err) => fail(&format!("cannot read {path}: {err}")),
    };
    let value: serde_json::Value = match serde_json::from_str(&source) {
        Ok(value) => value,
        Err(err) => fail(&format!("invalid JSON in {path}: {err}")),
    };
    let node = match load(&value) {
        Ok(node) => node,
        Err(err) => fail(&err.to_string()),
    };

    let end_class = if simple {
        EndClass::Simple
    } else {
        EndClass::Complex
    };
    let rendered = if text_mode {
        let mut settings = TextSettings {
            reverse,
            end_class,
            ..Default::default()
        };
        if let Some(width) = max_width {
            settings.max_width = width as i64;
        }
        render_text(&node, &settings)
    } else {
        let mut settings = VectorSettings {
            reverse,
            end_class,
            ..Default::default()
        };
        if let Some(width) = max_width {
            settings.max_width = width;
        }
        render_vector(&node, &settings)
    };

    match rendered {
        Ok(out) => println!("{out}"),
        Err(err) => fail(&err.to_string()),
    }
}

fn read_source(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn usage() -> ! {
    eprintln!("Usage: railviz [--text|--svg] [--reverse] [--simple] [--max-width N] <diagram.json>");
    eprintln!("Reads a JSON diagram description ('-' for stdin) and writes the drawing to stdout.");
    process::exit(2);
}
