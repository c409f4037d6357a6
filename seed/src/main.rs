use clap::Parser;

use foodaid::database::{RedisStore, init_redis};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Redis instance to seed.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let connection = init_redis(&args.redis_url).await;
    let store = RedisStore::new(connection);

    if seed::seed_all(&store).await? {
        println!("Seed complete.");
    } else {
        println!("Store already contains the demo accounts. Skipping seed.");
    }
    Ok(())
}
