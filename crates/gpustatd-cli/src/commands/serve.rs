use gpustatd_server::ServerConfig;

pub fn run(host: &str, port: u16, prefix: &str, token: &str) {
    let config = ServerConfig::new(host, port, prefix, token);
    if config.token.is_empty() {
        log::warn!("TOKEN is not set, the API is open to public access.");
    }
    log::info!("URL_PREFIX: \"{}\", PORT: \"{}\"", config.prefix, config.port);

    let provider = super::make_provider();

    let base = format!("http://{host}:{port}{}", config.prefix);
    println!("gpustatd v{}", gpustatd_core::VERSION);
    println!("   {base}");
    println!();
    println!("   Endpoints:");
    println!("     GET {}/count     Number of visible GPUs", config.prefix);
    println!("     GET {}/status    Device and process snapshot", config.prefix);
    println!();
    println!("   Query params for {}/status:", config.prefix);
    println!("     idx=0,1          Comma-separated device indices (default: all)");
    println!("     process=C|G|NA   Filter processes by type");
    println!();
    println!("   Examples:");
    println!("     curl {base}/count");
    println!("     curl \"{base}/status?idx=0&process=C\"");
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap();
    if let Err(err) = rt.block_on(gpustatd_server::run_server(provider, &config)) {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
