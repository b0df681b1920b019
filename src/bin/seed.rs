use candle_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;
    seed_products(&pool).await?;
    seed_coupons(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // Prices in PLN minor units.
    let products = vec![
        ("Lavender Field", "Soy wax, 40h burn time", 5900, 40),
        ("Amber & Oak", "Woody scent in an amber glass", 7400, 25),
        ("Sea Salt Breeze", "Fresh coastal scent", 6400, 30),
        ("Winter Spice", "Cinnamon, clove and orange peel", 6900, 50),
        ("Unscented Pillar", "Plain pillar candle, 60h burn time", 3900, 80),
    ];

    for (name, desc, price_pln, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_pln, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price_pln)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (code, percent_off, amount_off_pln, max_redemptions)
    let coupons: Vec<(&str, Option<i32>, Option<i64>, Option<i32>)> = vec![
        ("WELCOME10", Some(10), None, None),
        ("FIRSTORDER", None, Some(1_500), Some(100)),
    ];

    for (code, percent_off, amount_off_pln, max_redemptions) in coupons {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, percent_off, amount_off_pln, max_redemptions)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(percent_off)
        .bind(amount_off_pln)
        .bind(max_redemptions)
        .execute(pool)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
