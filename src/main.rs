use prostation::cli::run;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        // Internal errors (database problems) get a cause chain and exit 2
        let error_str = e.to_string();
        if error_str.contains("database")
            || error_str.contains("SQLite")
            || error_str.contains("Failed to")
        {
            eprintln!("Internal error: {}", e);
            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut indent = 1;
                while let Some(err) = source {
                    eprintln!("{:indent$}  {}", "", err);
                    source = err.source();
                    indent += 1;
                }
            }
            std::process::exit(2);
        } else {
            // User error
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
