use clap::Parser;
use portcullis::cli::{
    Args, build_config, init_logging, load_signing_secrets, open_database, validate_ttls,
};
use portcullis::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some((access_secret, refresh_secret)) = load_signing_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(ttl) = validate_ttls(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();

    let refresh_ttl = ttl.refresh;
    let config = build_config(&args, db, access_secret, refresh_secret, ttl);

    init_cleanup(&config.db, refresh_ttl).await;

    info!(address = %local_addr, "Listening");

    #[cfg(feature = "test-mode")]
    println!("PORTCULLIS_READY port={}", local_addr.port());

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
