#[tokio::main]
async fn main() {
    booking_orchestrator::run().await;
}
