use gpustatd_core::status::{ProcessFilter, collect_status, resolve_indices};

pub fn run(idx: Option<&str>, process: Option<&str>) {
    let provider = super::make_provider();

    let device_count = match provider.device_count() {
        Ok(count) => count,
        Err(err) => {
            eprintln!("Error reading device count: {err}");
            std::process::exit(1);
        }
    };
    let indices = match resolve_indices(idx, device_count) {
        Ok(indices) => indices,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    let filter = match ProcessFilter::parse(process) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match collect_status(provider.as_ref(), &indices, filter, device_count) {
        Ok(payload) => println!("{}", serde_json::to_string_pretty(&payload).unwrap()),
        Err(err) => {
            eprintln!("Error collecting status: {err}");
            std::process::exit(1);
        }
    }
}
