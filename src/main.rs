use ::log::error;
use human_panic::setup_panic;
use pvbess::cli::run_cli;
use pvbess::log;

fn main() {
    setup_panic!();

    if let Err(err) = run_cli() {
        if log::is_logger_initialised() {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
