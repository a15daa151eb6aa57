fn main() {
    if let Err(e) = screenwatch_lib::run() {
        eprintln!("screenwatch: {}", e);
        std::process::exit(1);
    }
}
