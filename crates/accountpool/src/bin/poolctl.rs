use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "poolctl <command>\n\
             Commands:\n\
             - reset\n\
             - seed <role> <n>\n\
             - availability\n\
             - status\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .expect("DATABASE_URL or TEST_DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    match args[1].as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let role = args.get(2).map(String::as_str).unwrap_or("client");
            let n: i64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);
            seed(&pool, role, n).await?;
        }
        "availability" => availability(&pool).await?,
        "status" => status(&pool).await?,
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            pool_accounts,
            executions
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(pool)
    .await?;

    println!("reset OK");
    Ok(())
}

async fn seed(pool: &PgPool, role: &str, n: i64) -> anyhow::Result<()> {
    for i in 0..n {
        let email = format!("{role}{i}@pool.test");

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO pool_accounts (email, password, role)
            VALUES ($1, 'changeme', $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(id) => println!("+ inserted {role} account {email} id={id}"),
            None => println!("= {email} already present"),
        }
    }
    Ok(())
}

async fn availability(pool: &PgPool) -> anyhow::Result<()> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT role, COUNT(*)
        FROM pool_accounts
        WHERE is_leased = false AND is_healthy = true
        GROUP BY role
        ORDER BY role
        "#,
    )
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        println!("no available accounts");
    }
    for (role, count) in rows {
        println!("{role}: {count}");
    }
    Ok(())
}

async fn status(pool: &PgPool) -> anyhow::Result<()> {
    let (total, leased, unhealthy): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE is_leased),
               COUNT(*) FILTER (WHERE NOT is_healthy)
        FROM pool_accounts
        "#,
    )
    .fetch_one(pool)
    .await?;

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM executions WHERE status IN ('acquiring', 'running')",
    )
    .fetch_one(pool)
    .await?;

    println!("accounts: total={total} leased={leased} unhealthy={unhealthy} active_executions={active}");
    Ok(())
}
