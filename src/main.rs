//! cvsnap – command-line CV page → PDF exporter.
//!
//! Usage:
//!   cvsnap <input.html> [output.pdf] [--name "Jane Doe"] [--margin 10] [--print]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file
//! under the generated `<Name>_CV_<YYYY-MM-DD>.pdf` name.

use std::{env, fs, path::PathBuf, process};

use cvsnap::pipeline::{print_fallback, ExportConfig, Exporter};
use cvsnap::snapshot::rules_from_json;
use cvsnap::templates::sample_cv;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut config = ExportConfig::default();
    let mut print_mode = false;
    let mut use_sample = false;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--print" | "-p" => print_mode = true,
            "--sample" => use_sample = true,
            "--name" | "-n" => match iter.next() {
                Some(v) => config.subject_name = v.clone(),
                None => die("--name requires a value"),
            },
            "--id" => match iter.next() {
                Some(v) => config.container_id = v.clone(),
                None => die("--id requires a value"),
            },
            "--margin" | "-m" => match iter.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(v) if v >= 0.0 => config.margin_mm = v,
                _ => die("--margin requires a non-negative number (mm)"),
            },
            "--scale" => match iter.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(v) if v > 0.0 => config.scale = v,
                _ => die("--scale requires a positive number"),
            },
            "--quality" => match iter.next().and_then(|v| v.parse::<u8>().ok()) {
                Some(v @ 1..=100) => config.jpeg_quality = v,
                _ => die("--quality requires a number between 1 and 100"),
            },
            "--rules" | "-r" => match iter.next() {
                Some(path) => match fs::read_to_string(path) {
                    Ok(json) => match rules_from_json(&json) {
                        Ok(rules) => config.rules = rules,
                        Err(e) => die(&format!("error in '{path}': {e}")),
                    },
                    Err(e) => die(&format!("error reading '{path}': {e}")),
                },
                None => die("--rules requires a file path"),
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let (html, base_dir) = if use_sample {
        (sample_cv(), None)
    } else {
        let input = match input_path {
            Some(p) => p,
            None => {
                eprintln!("Error: no input file specified (or use --sample).");
                print_usage(&args[0]);
                process::exit(1);
            }
        };
        let html = match fs::read_to_string(&input) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading '{}': {e}", input.display());
                process::exit(1);
            }
        };
        let base = input.parent().map(|p| p.to_path_buf());
        (html, base)
    };

    if print_mode {
        // Fallback path: emit the sanitized snapshot for a native print dialog.
        match print_fallback(&html, &config) {
            Ok(snapshot_html) => {
                println!("{snapshot_html}");
                return;
            }
            Err(e) => {
                eprintln!("Error preparing print snapshot: {e}");
                process::exit(1);
            }
        }
    }

    let exporter = Exporter::new(config);
    match exporter.export_from(&html, base_dir.as_deref()) {
        Ok(out) => {
            let output = output_path.unwrap_or_else(|| {
                let mut o = base_dir.unwrap_or_default();
                o.push(&out.filename);
                o
            });
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("Error creating output directory: {e}");
                        process::exit(1);
                    }
                }
            }
            if let Err(e) = fs::write(&output, &out.pdf) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{}, {}x{} bitmap)",
                output.display(),
                out.pdf.len(),
                out.pages,
                if out.pages == 1 { "" } else { "s" },
                out.bitmap_size.0,
                out.bitmap_size.1,
            );
        }
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    }
}

fn die(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("cvsnap – CV page to PDF exporter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output.pdf] [flags]");
    eprintln!("  {prog} --sample [output.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>   CV page to export (images: data URIs or paths relative to it)");
    eprintln!("  [output.pdf]   Output path (default: <Name>_CV_<date>.pdf next to the input)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --name, -n     Subject name for the filename (default: Guillermo Caminero)");
    eprintln!("  --id           Export container id (default: cv-content)");
    eprintln!("  --margin, -m   Page margin in mm (default: 10)");
    eprintln!("  --scale        Raster oversampling factor (default: 2)");
    eprintln!("  --quality      JPEG quality 1-100 (default: 95)");
    eprintln!("  --rules, -r    JSON file of compaction rules (selector/property/value)");
    eprintln!("  --print, -p    Emit the sanitized snapshot HTML to stdout instead of a PDF");
    eprintln!("  --sample       Export the built-in sample CV");
    eprintln!("  --help         Print this message");
}
