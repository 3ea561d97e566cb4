fn main() {
    if let Err(err) = esdiag::cli::run() {
        esdiag::ui::eprintln_error(&err);
        std::process::exit(esdiag::exit::exit_code(&err));
    }
}
