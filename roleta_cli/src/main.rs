use chrono::Utc;
use clap::{Parser, Subcommand};
use roleta_core::{derive_hash_hex, ProvablyFairRng};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

#[derive(Parser)]
#[command(name = "roleta-cli", about = "Admin CLI for the roleta spin server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://roleta.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate server seed; a random one is generated when omitted.
    /// Takes effect on the next server start.
    RotateSeed { new_seed: Option<String> },
    /// Register a coupon code in the catalog
    AddCoupon { code: String },
    /// View last N claims
    ViewClaims {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export the claim ledger to CSV path
    ExportCsv { path: String },
}

async fn get_pool(url: Option<String>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or_else(|| "sqlite://roleta.db".into());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let pool = get_pool(cli.database_url).await?;

    match cli.command {
        Commands::RotateSeed { new_seed } => {
            let new_seed = new_seed.unwrap_or_else(ProvablyFairRng::generate_seed);
            let hash = derive_hash_hex(new_seed.as_bytes());
            sqlx::query("UPDATE params SET server_seed = ?, server_seed_hash = ? WHERE id = 1")
                .bind(new_seed)
                .bind(&hash)
                .execute(&pool)
                .await?;
            println!("Rotated server seed. New hash: {}", hash);
        }
        Commands::AddCoupon { code } => {
            let res = sqlx::query("INSERT OR IGNORE INTO coupons (code, created_at) VALUES (?, ?)")
                .bind(&code)
                .bind(Utc::now().to_rfc3339())
                .execute(&pool)
                .await?;
            if res.rows_affected() == 0 {
                println!("Coupon {} already exists", code);
            } else {
                println!("Added coupon {}", code);
            }
        }
        Commands::ViewClaims { n } => {
            let rows = sqlx::query("SELECT customer_id, segment_label, coupon_code, claimed_at FROM claims ORDER BY claimed_at DESC LIMIT ?")
                .bind(n)
                .fetch_all(&pool).await?;
            for r in rows {
                let customer_id: String = r.get("customer_id");
                let label: String = r.get("segment_label");
                let coupon: String = r.get("coupon_code");
                let ts: String = r.get("claimed_at");
                println!("{} customer={} won={} coupon={}", ts, customer_id, label, coupon);
            }
        }
        Commands::ExportCsv { path } => {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["customer_id", "segment_label", "coupon_code", "claimed_at"])?;
            let rows = sqlx::query("SELECT customer_id, segment_label, coupon_code, claimed_at FROM claims ORDER BY claimed_at ASC")
                .fetch_all(&pool).await?;
            let total = rows.len();
            for r in &rows {
                wtr.write_record([
                    r.get::<String, _>("customer_id"),
                    r.get::<String, _>("segment_label"),
                    r.get::<String, _>("coupon_code"),
                    r.get::<String, _>("claimed_at"),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", total, path);
        }
    }

    Ok(())
}
