//! gitmod binary entry point.

use gitmod::ui::output;

fn main() {
    if let Err(err) = gitmod::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
