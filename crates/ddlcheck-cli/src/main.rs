#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    if let Err(e) = ddlcheck_cli::run(std::env::args().collect()).await {
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}
