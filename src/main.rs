//! Craftfolio Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    craftfolio_backend::run().await;
}
