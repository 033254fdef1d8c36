use std::process;

#[tokio::main]
async fn main() {
    match resonate_receiver::cli::run().await {
        Ok(()) => {}
        Err(err) => {
            println!("{err}");
            process::exit(1);
        }
    }
}
