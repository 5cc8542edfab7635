use chrono::Duration;
use eco_marketplace_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    middleware::auth::{ADMIN_ROLE, issue_token},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    // Ensure migrations are applied.
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", ADMIN_ROLE).await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "Green Seller", "user").await?;
    let buyer_id = ensure_user(&pool, "buyer@example.com", "Thrifty Buyer", "user").await?;
    seed_listings(&pool, seller_id).await?;

    let ttl = Duration::days(30);
    for (label, id, role) in [
        ("admin", admin_id, ADMIN_ROLE),
        ("seller", seller_id, "user"),
        ("buyer", buyer_id, "user"),
    ] {
        let token = issue_token(&config.jwt_secret, id, role, ttl)?;
        println!("{label} {id}\n  Bearer {token}");
    }

    println!("Seed completed");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    display_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, display_name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(display_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_listings(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    // (title, price, quantity, shipping, pickup address, dutch auction start)
    let listings = vec![
        ("Refurbished road bike", 12000, 1, 0, Some("Kastanienallee 12, Berlin"), None),
        ("Vintage wool coat", 4500, 2, 490, None, None),
        ("Sourdough starter", 0, 20, 0, Some("Kastanienallee 12, Berlin"), None),
        ("Oak bookshelf", 9000, 1, 0, Some("Kastanienallee 12, Berlin"), Some(9000_i64)),
    ];

    for (title, price, quantity, shipping, pickup, dutch_start) in listings {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, seller_id, title, price, quantity_available, shipping_cost,
                pickup_address, is_dutch_auction, dutch_start_price, dutch_decrease_amount,
                dutch_decrease_hours, dutch_min_price, dutch_started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, CASE WHEN $8 THEN NOW() END)
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(title)
        .bind(price as i64)
        .bind(quantity)
        .bind(shipping as i64)
        .bind(pickup)
        .bind(dutch_start.is_some())
        .bind(dutch_start)
        .bind(dutch_start.map(|_| 500_i64))
        .bind(dutch_start.map(|_| 24_i32))
        .bind(dutch_start.map(|_| 3000_i64))
        .execute(pool)
        .await?;
    }

    println!("Seeded listings");
    Ok(())
}
