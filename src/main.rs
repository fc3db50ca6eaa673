fn main() {
    if let Err(err) = dbf_column_filler::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
