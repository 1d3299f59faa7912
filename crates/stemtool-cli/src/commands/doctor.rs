use anyhow::Result;
use std::path::Path;
use std::process::Command;
use stemtool_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<bool> {
    let config = Config::load(config_path)?;

    println!("stemtool dependency check\n");

    let mut all_ok = true;

    // Check yt-dlp
    print!("yt-dlp:        ");
    match config.yt_dlp_path() {
        Ok(path) => match version_line(&path, &["--version"]) {
            Some(v) => println!("OK ({})", v),
            None => {
                println!("FOUND but failed to get version");
                all_ok = false;
            }
        },
        Err(_) => {
            println!("NOT FOUND");
            println!("               Install with: pip install yt-dlp");
            all_ok = false;
        }
    }

    // Check FFmpeg and the rubberband filter used for transposition
    print!("ffmpeg:        ");
    match config.ffmpeg_path() {
        Ok(path) => {
            match version_line(&path, &["-version"]) {
                Some(first_line) => {
                    // Extract just version number
                    let version = first_line.split_whitespace().nth(2).unwrap_or("unknown");
                    println!("OK ({})", version);
                }
                None => {
                    println!("FOUND but failed to get version");
                    all_ok = false;
                }
            }

            print!("  rubberband:  ");
            let filters = Command::new(&path)
                .args(["-hide_banner", "-filters"])
                .output();
            match filters {
                Ok(out) if String::from_utf8_lossy(&out.stdout).contains("rubberband") => {
                    println!("OK");
                }
                _ => {
                    println!("NOT AVAILABLE (transpose needs FFmpeg built with --enable-librubberband)");
                    all_ok = false;
                }
            }
        }
        Err(_) => {
            println!("NOT FOUND");
            println!("               Install with: brew install ffmpeg");
            all_ok = false;
        }
    }

    // Check Python and Demucs
    print!("python:        ");
    match config.python_path() {
        Ok(python) => {
            match version_line(&python, &["--version"]) {
                Some(v) => println!("OK ({})", v.replace("Python ", "")),
                None => println!("FOUND but failed to get version"),
            }

            print!("  demucs:      ");
            let check = Command::new(&python)
                .args(["-c", "import demucs; print(demucs.__version__)"])
                .output();
            match check {
                Ok(out) if out.status.success() => {
                    println!("OK ({})", String::from_utf8_lossy(&out.stdout).trim());
                }
                _ => {
                    println!("NOT INSTALLED");
                    println!("               Install with: pip install demucs");
                    all_ok = false;
                }
            }
        }
        Err(_) => {
            println!("NOT FOUND");
            println!("               Install with: brew install python@3.11");
            all_ok = false;
        }
    }

    // Spleeter is optional when Demucs is the configured engine
    print!("spleeter:      ");
    match config.spleeter_path() {
        Ok(path) => println!("OK ({})", path.display()),
        Err(_) => {
            println!("NOT FOUND");
            if config.separate.engine.eq_ignore_ascii_case("spleeter") {
                println!("               Install with: pip install spleeter");
                all_ok = false;
            }
        }
    }

    println!();
    if all_ok {
        println!("All dependencies OK!");
    } else {
        println!("Some dependencies are missing. See above for installation instructions.");
    }

    Ok(all_ok)
}

/// First non-empty line a tool prints for its version flag (stdout, then stderr)
fn version_line(program: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    [out.stdout, out.stderr]
        .iter()
        .flat_map(|bytes| {
            String::from_utf8_lossy(bytes)
                .lines()
                .map(|l| l.trim().to_string())
                .collect::<Vec<_>>()
        })
        .find(|l| !l.is_empty())
}
