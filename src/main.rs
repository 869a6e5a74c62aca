use rewriter_rs::{config, finder, Processor};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct CliConfig {
    inputs: Vec<String>,
    recursive: bool,
    verbose: bool,
    max_threads: usize,
    rule_file: Option<String>,
}

fn usage(exe: &str) {
    eprintln!(
        "usage: {exe} [-r|--recursive] [-v|--verbose] [-t N|--threads=N] \
         [--rules=FILE] [-h|--help] [-V|--version] <inputs...>"
    );
    eprintln!();
    eprintln!("Rewrites files in place according to a '{}' rule file,", config::RULE_FILE_NAME);
    eprintln!("looked up in ~/.local/share/rewriter-rs/ and the current directory.");
    eprintln!("Inputs may be files, directories, or glob patterns (* and ?).");
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig {
        inputs: Vec::new(),
        recursive: false,
        verbose: false,
        max_threads: 0,
        rule_file: None,
    };

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-r" | "--recursive" => cfg.recursive = true,
            "-v" | "--verbose" => cfg.verbose = true,
            "-t" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "missing value for -t".to_string())?;
                cfg.max_threads = value
                    .parse()
                    .map_err(|_| format!("invalid thread count '{value}'"))?;
            }
            flag if flag.starts_with("--threads=") => {
                let value = &flag["--threads=".len()..];
                cfg.max_threads = value
                    .parse()
                    .map_err(|_| format!("invalid thread count '{value}'"))?;
            }
            flag if flag.starts_with("--rules=") => {
                cfg.rule_file = Some(flag["--rules=".len()..].to_string());
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown flag: {flag}"));
            }
            _ => cfg.inputs.push(arg.clone()),
        }
    }
    Ok(cfg)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let exe = args
        .first()
        .map(String::as_str)
        .unwrap_or("rewriter-rs")
        .to_string();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage(&exe);
        return ExitCode::SUCCESS;
    }
    if args.iter().any(|a| a == "-V" || a == "--version") {
        println!("rewriter-rs {VERSION}");
        return ExitCode::SUCCESS;
    }

    let cfg = match parse_args(&args[1..]) {
        Ok(cfg) => cfg,
        Err(msg) => {
            eprintln!("error: {msg}");
            usage(&exe);
            return ExitCode::from(2);
        }
    };

    if cfg.inputs.is_empty() {
        eprintln!("error: no input files specified");
        usage(&exe);
        return ExitCode::FAILURE;
    }

    let start = Instant::now();

    let rules = match config::load_rules(cfg.rule_file.as_deref().map(std::path::Path::new)) {
        Ok(rules) => rules,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cfg.verbose {
        println!(
            "loaded {} replacement rules, {} protected regions",
            rules.replacements.len(),
            rules.protected_regions.len()
        );
    }

    let files = finder::find_files(&cfg.inputs, cfg.recursive);
    if files.is_empty() {
        eprintln!("error: no files found to process");
        return ExitCode::FAILURE;
    }
    if cfg.verbose {
        println!("found {} files to process", files.len());
    }

    let processor = Processor::new(&rules.replacements, rules.protected_regions.clone());
    let results = match processor.process(&files, cfg.max_threads) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut files_ok = 0usize;
    let mut total_replacements = 0usize;
    for result in &results {
        if result.ok {
            files_ok += 1;
            total_replacements += result.replacement_count;
            if cfg.verbose {
                if result.replacement_count > 0 {
                    println!(
                        "processed: {} ({} replacements)",
                        result.file_path.display(),
                        result.replacement_count
                    );
                } else {
                    println!("processed: {}", result.file_path.display());
                }
            }
        } else {
            eprintln!(
                "failed to process {}: {}",
                result.file_path.display(),
                result.err_msg
            );
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("processing complete:");
    println!("  files processed: {files_ok}/{}", results.len());
    println!("  total replacements: {total_replacements}");
    println!("  time taken: {} ms", elapsed.as_millis());

    if files_ok == results.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_inputs() {
        let args: Vec<String> = ["-r", "-t", "8", "docs", "*.md"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cfg = parse_args(&args).unwrap();
        assert!(cfg.recursive);
        assert_eq!(cfg.max_threads, 8);
        assert_eq!(cfg.inputs, vec!["docs".to_string(), "*.md".to_string()]);
    }

    #[test]
    fn parses_threads_equals_form() {
        let args = vec!["--threads=4".to_string(), "x".to_string()];
        let cfg = parse_args(&args).unwrap();
        assert_eq!(cfg.max_threads, 4);
    }

    #[test]
    fn rejects_unknown_flags() {
        let args = vec!["--bogus".to_string()];
        assert!(parse_args(&args).is_err());
    }

    #[test]
    fn rejects_bad_thread_count() {
        let args = vec!["--threads=lots".to_string()];
        assert!(parse_args(&args).is_err());
    }
}
