use log::error;

#[tokio::main]
async fn main() {
    if let Err(e) = prismgallery_lib::run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
