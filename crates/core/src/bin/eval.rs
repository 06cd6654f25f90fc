//! Evaluate a position from the command line using the configured engine pool

use std::process;

use chess_eval_core::{stockfish_analyzer, Config};

fn print_usage(program: &str) {
    println!("Usage: {} <quick|deep|line> \"<fen>\"", program);
    println!();
    println!("Engine settings are read from CHESS_EVAL_* environment variables.");
    println!();
    println!("Example:");
    println!(
        "  {} line \"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1\"",
        program
    );
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || !matches!(args[1].as_str(), "quick" | "deep" | "line") {
        print_usage(&args[0]);
        process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(c) => Config { pool_size: 1, ..c },
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            process::exit(1);
        }
    };

    let analyzer = match stockfish_analyzer(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            eprintln!();
            eprintln!("Make sure Stockfish is installed:");
            eprintln!("  sudo apt install stockfish");
            process::exit(1);
        }
    };

    let fen = args[2].as_str();
    let output = match args[1].as_str() {
        "quick" => analyzer.quick_evaluate(fen).map(|r| serde_json::to_string_pretty(&r)),
        "deep" => analyzer.deep_evaluate(fen).map(|r| serde_json::to_string_pretty(&r)),
        _ => analyzer.line_evaluate(fen).map(|r| serde_json::to_string_pretty(&r)),
    };

    analyzer.shutdown();

    match output {
        Ok(Ok(json)) => println!("{}", json),
        Ok(Err(e)) => {
            eprintln!("[ERROR] {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            process::exit(1);
        }
    }
}
