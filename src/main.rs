fn main() {
    if let Err(err) = branchflow::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
