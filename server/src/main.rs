#[tokio::main]
async fn main() {
    foodaid::start_server().await;
}
