pub fn run() {
    let provider = super::make_provider();
    match provider.device_count() {
        Ok(count) => println!("{count}"),
        Err(err) => {
            eprintln!("Error reading device count: {err}");
            std::process::exit(1);
        }
    }
}
