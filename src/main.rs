#[tokio::main]
async fn main() {
    rabbitcat::cli::run(std::env::args()).await;
}
