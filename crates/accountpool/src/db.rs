use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn make_pool(
    database_url: &str,
    max_connections: u32,
    pre_ping: bool,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .test_before_acquire(pre_ping)
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
